//! Mutation Context
//!
//! Bookkeeping shared by in-flight mutations: the per-mutation pre-image,
//! the settle batch that decides when the list is refetched, and the
//! pending flags renderers poll for progress indicators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::models::Todo;
use crate::store::{QueryCache, QueryKey};

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    /// Cache edited, network call in flight
    Speculative,
    Committed,
    RolledBack,
}

/// Pre-image of the single record a mutation touched
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub target_id: String,
    /// Value before the speculative edit; `None` when the record was not cached
    pub previous: Option<Todo>,
    /// Position in the list before the edit
    pub index: Option<usize>,
    state: MutationState,
}

impl PendingMutation {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            previous: None,
            index: None,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Record the pre-image and enter `Speculative`
    pub fn speculate(&mut self, previous: Option<Todo>, index: Option<usize>) {
        debug_assert_eq!(self.state, MutationState::Idle);
        self.previous = previous;
        self.index = index;
        self.state = MutationState::Speculative;
    }

    /// Remote call succeeded; the pre-image is no longer needed
    pub fn commit(&mut self) {
        debug_assert_eq!(self.state, MutationState::Speculative);
        self.previous = None;
        self.state = MutationState::Committed;
    }

    /// Remote call failed; hand back the pre-image to restore
    pub fn roll_back(&mut self) -> Option<(Option<usize>, Todo)> {
        debug_assert_eq!(self.state, MutationState::Speculative);
        self.state = MutationState::RolledBack;
        self.previous.take().map(|todo| (self.index, todo))
    }

    /// Authoritative data replaced the cache
    pub fn reset(&mut self) {
        self.previous = None;
        self.index = None;
        self.state = MutationState::Idle;
    }
}

#[derive(Debug, Default)]
struct BatchState {
    in_flight: usize,
    refetch_requested: bool,
}

/// Groups overlapping mutations so only the last one to settle refetches.
///
/// A batch is the set of mutations whose lifetimes overlap: it opens when
/// the in-flight count leaves zero and closes when it returns to zero.
#[derive(Debug, Clone, Default)]
pub struct SettleBatch {
    state: Arc<Mutex<BatchState>>,
}

impl SettleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mutation on `key` started. It stays in the batch until its ticket
    /// is settled or dropped.
    pub fn enter(&self, cache: &QueryCache, key: &QueryKey) -> BatchTicket {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight += 1;
        BatchTicket {
            batch: self.clone(),
            cache: cache.clone(),
            key: key.clone(),
            settled: false,
        }
    }

    /// Returns true when the caller is the last one out of a batch in which
    /// some member asked for a refetch.
    fn settle(&self, wants_refetch: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = state.in_flight.saturating_sub(1);
        state.refetch_requested |= wants_refetch;

        if state.in_flight == 0 && state.refetch_requested {
            state.refetch_requested = false;
            true
        } else {
            false
        }
    }

    /// Leave without settling. The refetch request carries over to whoever
    /// settles next.
    fn abandon(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = state.in_flight.saturating_sub(1);
        state.refetch_requested = true;
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).in_flight
    }

    /// A refetch is owed to the list
    pub fn refetch_requested(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .refetch_requested
    }
}

/// Batch membership of one in-flight mutation.
///
/// Dropping it unsettled means the mutation future was abandoned with its
/// speculative edit still cached: the list is marked stale and the batch
/// is left owing a refetch.
#[derive(Debug)]
pub struct BatchTicket {
    batch: SettleBatch,
    cache: QueryCache,
    key: QueryKey,
    settled: bool,
}

impl BatchTicket {
    /// Leave the batch. True when the caller must refetch.
    pub fn settle(mut self, wants_refetch: bool) -> bool {
        self.settled = true;
        self.batch.settle(wants_refetch)
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!(key = %self.key, "Mutation abandoned before settling");
        self.batch.abandon();
        self.cache.invalidate(&self.key);
    }
}

/// Operation categories with their own progress indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ListFetch,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    fn slot(self) -> usize {
        match self {
            OperationKind::ListFetch => 0,
            OperationKind::Create => 1,
            OperationKind::Update => 2,
            OperationKind::Delete => 3,
        }
    }
}

/// In-flight counters per operation category
#[derive(Debug, Default)]
pub struct PendingFlags {
    counters: [AtomicUsize; 4],
}

impl PendingFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.count(kind) > 0
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.counters[kind.slot()].load(Ordering::SeqCst)
    }

    /// Mark one operation as running until the guard drops
    pub fn start(self: &Arc<Self>, kind: OperationKind) -> PendingGuard {
        self.counters[kind.slot()].fetch_add(1, Ordering::SeqCst);
        PendingGuard {
            flags: Arc::clone(self),
            kind,
        }
    }
}

/// Decrements its counter on drop
#[derive(Debug)]
pub struct PendingGuard {
    flags: Arc<PendingFlags>,
    kind: OperationKind,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.flags.counters[self.kind.slot()].fetch_sub(1, Ordering::SeqCst);
    }
}
