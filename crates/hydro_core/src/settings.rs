use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{SettingsError, StoreError},
    storage::Storage,
};

pub const SETTINGS_KEY: &str = "hydroponic_settings";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncInterval {
    Realtime,
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl FromStr for SyncInterval {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "realtime" => Ok(SyncInterval::Realtime),
            "hourly" => Ok(SyncInterval::Hourly),
            "daily" => Ok(SyncInterval::Daily),
            "weekly" => Ok(SyncInterval::Weekly),
            other => Err(format!("unknown sync interval `{other}`")),
        }
    }
}

impl fmt::Display for SyncInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncInterval::Realtime => "realtime",
            SyncInterval::Hourly => "hourly",
            SyncInterval::Daily => "daily",
            SyncInterval::Weekly => "weekly",
        };
        f.write_str(label)
    }
}

/// User preferences. Fields missing from a stored payload fall back to
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub username: String,
    pub email: String,
    pub dark_mode: bool,
    pub data_sync_interval: SyncInterval,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            username: "HydroUser".to_string(),
            email: String::new(),
            dark_mode: false,
            data_sync_interval: SyncInterval::default(),
        }
    }
}

pub struct SettingsStore {
    storage: Arc<dyn Storage>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> Settings {
        let raw = match self.storage.read(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Settings::default(),
            Err(err) => {
                tracing::warn!(error = %err, "settings unreadable, using defaults");
                return Settings::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "settings corrupt, using defaults");
            Settings::default()
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if !settings.email.is_empty() && !looks_like_email(&settings.email) {
            return Err(SettingsError::InvalidEmail(settings.email.clone()));
        }
        let payload = serde_json::to_string(settings).map_err(|source| StoreError::Encode {
            key: SETTINGS_KEY.to_string(),
            source,
        })?;
        self.storage.write(SETTINGS_KEY, &payload)?;
        tracing::info!(username = %settings.username, "settings saved");
        Ok(())
    }

    /// Forgets the stored preferences; the next `load` yields defaults.
    pub fn reset(&self) -> Result<(), SettingsError> {
        self.storage.remove(SETTINGS_KEY)?;
        tracing::info!("settings reset to defaults");
        Ok(())
    }
}

/// `local@domain.tld` shape check; deliverability is not our concern.
pub fn looks_like_email(candidate: &str) -> bool {
    candidate.split_whitespace().any(|token| {
        let Some((local, domain)) = token.split_once('@') else {
            return false;
        };
        if local.is_empty() {
            return false;
        }
        domain
            .char_indices()
            .any(|(idx, ch)| ch == '.' && idx > 0 && idx + 1 < domain.len())
    })
}
