//! Client Configuration
//!
//! Read from an optional JSON file, then overridden by `TODO_SYNC_*`
//! environment variables.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::mutation::DeleteFailurePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "todo_sync.json";
const ENV_PREFIX: &str = "TODO_SYNC_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend_url: String,
    pub assignee_feed_url: String,
    pub assignee_count: usize,
    pub storage_path: PathBuf,
    pub log_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub delete_failure_policy: DeleteFailurePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8090".to_string(),
            assignee_feed_url: "https://randomuser.me/api/".to_string(),
            assignee_count: 10,
            storage_path: PathBuf::from("todo-sync-storage.json"),
            log_dir: PathBuf::from("logs"),
            request_timeout_secs: 10,
            delete_failure_policy: DeleteFailurePolicy::KeepRemoved,
        }
    }
}

/// What `load` did, kept for logging once the logger is installed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigReport {
    pub source: Option<PathBuf>,
    /// Rejected override values
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn log(&self) {
        match &self.source {
            Some(path) => info!(path = %path.display(), "Loaded config file"),
            None => info!("Using default config"),
        }
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }
}

impl ClientConfig {
    /// File named by `TODO_SYNC_CONFIG` (or `todo_sync.json` if present),
    /// then environment overrides
    pub fn load() -> AppResult<(Self, ConfigReport)> {
        let explicit = std::env::var(format!("{}CONFIG", ENV_PREFIX)).ok().map(PathBuf::from);
        let source = match explicit {
            Some(path) => Some(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
            None => None,
        };
        let mut config = match &source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let warnings = config.apply_overrides(|key| std::env::var(key).ok());
        Ok((config, ConfigReport { source, warnings }))
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply `TODO_SYNC_<FIELD>` values from `lookup`. Invalid values keep
    /// the previous setting and are returned as warnings.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut warnings = Vec::new();

        if let Some(url) = var("BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(url) = var("ASSIGNEE_FEED_URL") {
            self.assignee_feed_url = url;
        }
        if let Some(path) = var("STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Some(path) = var("LOG_DIR") {
            self.log_dir = PathBuf::from(path);
        }
        try_override(
            &mut self.assignee_count,
            "ASSIGNEE_COUNT",
            var("ASSIGNEE_COUNT"),
            &mut warnings,
        );
        try_override(
            &mut self.request_timeout_secs,
            "REQUEST_TIMEOUT_SECS",
            var("REQUEST_TIMEOUT_SECS"),
            &mut warnings,
        );
        if let Some(policy) = var("DELETE_FAILURE_POLICY") {
            match policy.as_str() {
                "keep_removed" => self.delete_failure_policy = DeleteFailurePolicy::KeepRemoved,
                "restore" => self.delete_failure_policy = DeleteFailurePolicy::Restore,
                other => warnings.push(format!("Invalid DELETE_FAILURE_POLICY value: {other}")),
            }
        }
        warnings
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn try_override<T: FromStr>(field: &mut T, key: &str, raw: Option<String>, warnings: &mut Vec<String>)
where
    T::Err: Display,
{
    let Some(raw) = raw else {
        return;
    };
    match raw.parse() {
        Ok(value) => *field = value,
        Err(e) => warnings.push(format!("Invalid {key} value: {e}, keeping previous")),
    }
}
