use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::theme::ThemePreference;

const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_AUTOPLAY_GRACE_MS: u64 = 500;
const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StartZonePolicy {
    /// Starting a zone mid-draw is refused.
    #[default]
    Reject,
    /// Starting a zone mid-draw silently drops the in-progress points.
    Reset,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    pub autoplay: bool,
    pub autoplay_grace_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            autoplay: true,
            autoplay_grace_ms: DEFAULT_AUTOPLAY_GRACE_MS,
        }
    }
}

impl StreamSettings {
    pub fn autoplay_grace(&self) -> Duration {
        Duration::from_millis(self.autoplay_grace_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub start_zone_policy: StartZonePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    theme: ThemePreference,
    poll: PollSettings,
    stream: StreamSettings,
    editor: EditorSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn theme(&self) -> ThemePreference {
        self.read().theme
    }

    pub fn update_theme(&self, theme: ThemePreference) -> Result<()> {
        let mut guard = self.write();
        guard.theme = theme;
        self.persist(&guard)
    }

    /// Poll settings with the `PARKZONE_POLL_MS` override applied.
    pub fn poll(&self) -> PollSettings {
        let mut poll = self.read().poll;
        if let Some(interval_ms) = std::env::var("PARKZONE_POLL_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            poll.interval_ms = interval_ms;
        }
        poll
    }

    pub fn update_poll(&self, poll: PollSettings) -> Result<()> {
        let mut guard = self.write();
        guard.poll = poll;
        self.persist(&guard)
    }

    pub fn stream(&self) -> StreamSettings {
        self.read().stream
    }

    pub fn editor(&self) -> EditorSettings {
        self.read().editor
    }

    pub fn update_editor(&self, editor: EditorSettings) -> Result<()> {
        let mut guard = self.write();
        guard.editor = editor;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }
}
