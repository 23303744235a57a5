//! Theme preference, persisted in local storage.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::storage::LocalStorage;

pub const THEME_STORAGE_KEY: &str = "theme-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    /// Follow the platform preference
    #[default]
    System,
}

impl Theme {
    /// Concrete theme to apply
    pub fn resolve(self, prefers_dark: bool) -> Theme {
        match self {
            Theme::System if prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            "system" => Ok(Theme::System),
            other => Err(AppError::Config(format!("Unknown theme: {}", other))),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ThemeState {
    theme: Theme,
}

/// Stored layout: `{"state":{"theme":"dark"},"version":0}`
#[derive(Serialize, Deserialize)]
struct PersistedTheme {
    state: ThemeState,
    #[serde(default)]
    version: u32,
}

pub struct ThemeStore {
    storage: Arc<LocalStorage>,
    theme: RwLock<Theme>,
}

impl ThemeStore {
    /// Hydrate from storage, falling back to the default theme
    pub fn load(storage: Arc<LocalStorage>) -> Self {
        let theme = storage
            .get_item::<PersistedTheme>(THEME_STORAGE_KEY)
            .map(|p| p.state.theme)
            .unwrap_or_default();
        Self {
            storage,
            theme: RwLock::new(theme),
        }
    }

    pub fn theme(&self) -> Theme {
        *self.theme.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<()> {
        *self.theme.write().unwrap_or_else(PoisonError::into_inner) = theme;
        self.storage.set_item(
            THEME_STORAGE_KEY,
            &PersistedTheme {
                state: ThemeState { theme },
                version: 0,
            },
        )
    }
}
