//! Process-wide theme value.
//!
//! The composition root creates one [`ThemeHandle`] from the persisted
//! preference (or the system default) and hands clones to every renderer.
//! The theme only changes through [`ThemeHandle::toggle`] or
//! [`ThemeHandle::set_preference`].

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ThemePreference {
    #[default]
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Reads `PARKZONE_SYSTEM_THEME`; anything other than `dark` means light.
    pub fn system_default() -> Self {
        match std::env::var("PARKZONE_SYSTEM_THEME") {
            Ok(value) if value.trim().eq_ignore_ascii_case("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl ThemePreference {
    pub fn resolve(self, system: Theme) -> Theme {
        match self {
            ThemePreference::System => system,
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::Dark,
        }
    }
}

#[derive(Clone)]
pub struct ThemeHandle {
    system: Theme,
    tx: watch::Sender<Theme>,
}

impl ThemeHandle {
    pub fn new(preference: ThemePreference, system: Theme) -> Self {
        let (tx, _rx) = watch::channel(preference.resolve(system));
        Self { system, tx }
    }

    pub fn current(&self) -> Theme {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    /// Flip between light and dark. Returns the explicit preference to persist.
    pub fn toggle(&self) -> ThemePreference {
        let next = self.current().opposite();
        self.tx.send_replace(next);
        match next {
            Theme::Light => ThemePreference::Light,
            Theme::Dark => ThemePreference::Dark,
        }
    }

    pub fn set_preference(&self, preference: ThemePreference) -> Theme {
        let theme = preference.resolve(self.system);
        self.tx.send_replace(theme);
        theme
    }
}
