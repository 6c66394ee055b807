use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::db::models::{BreakType, SessionConfig};

/// What a session starts with when the caller does not pick values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDefaults {
    pub work_duration_minutes: u32,
    pub break_type: BreakType,
    pub total_iterations: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            work_duration_minutes: 25,
            break_type: BreakType::Short,
            total_iterations: 4,
        }
    }
}

impl From<SessionDefaults> for SessionConfig {
    fn from(defaults: SessionDefaults) -> Self {
        Self {
            work_duration_minutes: defaults.work_duration_minutes,
            break_type: defaults.break_type,
            total_iterations: defaults.total_iterations,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    session_defaults: SessionDefaults,
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
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        self.read().session_defaults
    }

    /// Validate and persist new defaults.
    pub fn update_session_defaults(&self, defaults: SessionDefaults) -> Result<()> {
        SessionConfig::from(defaults)
            .validate()
            .map_err(|message| anyhow::anyhow!(message))?;

        let mut guard = self.write();
        let previous = guard.session_defaults;
        guard.session_defaults = defaults;
        if let Err(err) = self.persist(&guard) {
            guard.session_defaults = previous;
            return Err(err);
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");

        assert_eq!(store.session_defaults(), SessionDefaults::default());
    }

    #[test]
    fn updated_defaults_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).expect("store");
        let defaults = SessionDefaults {
            work_duration_minutes: 50,
            break_type: BreakType::Long,
            total_iterations: 2,
        };

        store.update_session_defaults(defaults).expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        assert_eq!(reopened.session_defaults(), defaults);
    }

    #[test]
    fn invalid_defaults_are_rejected_and_not_stored() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).expect("store");

        let result = store.update_session_defaults(SessionDefaults {
            work_duration_minutes: 0,
            ..SessionDefaults::default()
        });

        assert!(result.is_err());
        assert_eq!(store.session_defaults(), SessionDefaults::default());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write corrupt file");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.session_defaults(), SessionDefaults::default());
    }
}
