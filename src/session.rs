//! Session/Auth Gate
//!
//! Keeps the auth session, persists it across restarts, and decides which
//! route a user may see.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::commands::AuthProvider;
use crate::error::{AppResult, AuthError, ValidationError};
use crate::models::{AuthSession, UserIdentity};
use crate::storage::LocalStorage;

/// Storage key holding the persisted session
pub const AUTH_STORAGE_KEY: &str = "pocketbase_auth";
pub const MIN_PASSWORD_LEN: usize = 8;

/// Screens guarded by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
}

/// The guard refused a route; show this one instead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect(pub Route);

pub struct SessionGate {
    auth: Arc<dyn AuthProvider>,
    storage: Arc<LocalStorage>,
    session: RwLock<Option<AuthSession>>,
    auth_ready: AtomicBool,
}

impl SessionGate {
    /// Create the gate, picking up any session persisted earlier
    pub fn new(auth: Arc<dyn AuthProvider>, storage: Arc<LocalStorage>) -> Self {
        let session: Option<AuthSession> = storage.get_item(AUTH_STORAGE_KEY);
        auth.use_session(session.as_ref());
        Self {
            auth,
            storage,
            session: RwLock::new(session),
            auth_ready: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Token present and unexpired, with a user record
    pub fn is_logged_in(&self) -> bool {
        self.session()
            .map(|s| !s.token.is_empty() && !is_token_expired(&s.token, Utc::now()))
            .unwrap_or(false)
    }

    /// The logged-in user, if any
    pub fn current_user(&self) -> Option<UserIdentity> {
        if self.is_logged_in() {
            self.session().map(|s| s.record)
        } else {
            None
        }
    }

    pub fn is_auth_ready(&self) -> bool {
        self.auth_ready.load(Ordering::SeqCst)
    }

    /// Refresh a restored session before routes are guarded.
    ///
    /// A failed refresh clears the session without surfacing an error.
    pub async fn ensure_auth_ready(&self) -> Option<UserIdentity> {
        if let Some(session) = self.current_session() {
            match self.auth.refresh(&session).await {
                Ok(refreshed) => {
                    if let Err(e) = self.store(Some(refreshed)) {
                        warn!(error = %e, "Failed to persist refreshed session");
                    }
                }
                Err(e) => {
                    info!(error = %e, "Session refresh failed, clearing session");
                    if let Err(e) = self.store(None) {
                        warn!(error = %e, "Failed to clear stored session");
                    }
                }
            }
        } else if self.session().is_some() {
            // Expired token: nothing to refresh with
            if let Err(e) = self.store(None) {
                warn!(error = %e, "Failed to clear stored session");
            }
        }

        self.auth_ready.store(true, Ordering::SeqCst);
        self.current_user()
    }

    /// Password login. Returns the existing user when already logged in.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserIdentity> {
        validate_credentials(email, password)?;

        if let Some(user) = self.current_user() {
            return Ok(user);
        }

        let session = self.auth.authenticate(email, password).await?;
        let user = session.record.clone();
        self.store(Some(session))?;
        info!(user = %user.id, "Logged in");
        Ok(user)
    }

    pub fn logout(&self) -> AppResult<()> {
        self.store(None)?;
        info!("Logged out");
        Ok(())
    }

    /// The logged-in user, or `NotLoggedIn` so the caller redirects to login
    pub fn require_auth(&self) -> Result<UserIdentity, AuthError> {
        self.current_user().ok_or(AuthError::NotLoggedIn)
    }

    /// `Home` needs a session; `Login` is pointless with one
    pub fn guard(&self, requested: Route) -> Result<Route, Redirect> {
        match (requested, self.is_logged_in()) {
            (Route::Home, false) => Err(Redirect(Route::Login)),
            (Route::Login, true) => Err(Redirect(Route::Home)),
            (route, _) => Ok(route),
        }
    }

    fn current_session(&self) -> Option<AuthSession> {
        if self.is_logged_in() {
            self.session()
        } else {
            None
        }
    }

    fn store(&self, session: Option<AuthSession>) -> AppResult<()> {
        self.auth.use_session(session.as_ref());
        let result = match &session {
            Some(s) => self.storage.set_item(AUTH_STORAGE_KEY, s),
            None => self.storage.remove_item(AUTH_STORAGE_KEY),
        };
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
        result
    }
}

#[derive(Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// JWT expiry check. Unreadable tokens count as expired; tokens without an
/// `exp` claim never expire.
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    let Some(payload) = token.split('.').nth(1) else {
        return true;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return true;
    };
    match serde_json::from_slice::<TokenClaims>(&bytes) {
        Ok(TokenClaims { exp: Some(exp) }) => exp <= now.timestamp(),
        Ok(TokenClaims { exp: None }) => false,
        Err(_) => true,
    }
}

/// Login form checks
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
