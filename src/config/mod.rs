use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::keys::ApiKeyEntry;
use crate::store::Storage;
use crate::Result;

/// Storage key holding the serialized settings
pub const SETTINGS_KEY: &str = "settings.yaml";

/// In-flight job limit applied when concurrency is automatic
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound for a user-chosen limit
pub const MAX_CONCURRENCY: usize = 10;

/// How many jobs may be in flight at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Concurrency {
    #[default]
    Auto,
    Fixed(usize),
}

impl Concurrency {
    /// Effective limit, clamped to a sane range
    pub fn limit(&self) -> usize {
        match self {
            Concurrency::Auto => DEFAULT_CONCURRENCY,
            Concurrency::Fixed(n) => (*n).clamp(1, MAX_CONCURRENCY),
        }
    }
}

/// User-managed settings, persisted locally and rewritten in full on every
/// mutation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Named transcription API keys
    pub api_keys: Vec<ApiKeyEntry>,

    /// Which entry in `api_keys` is active
    pub active_key_id: Option<String>,

    /// System-wide fallback key used when no entry is active
    pub default_api_key: Option<String>,

    /// Credential for the premium caption-search strategy
    pub caption_api_key: Option<String>,

    /// In-flight job limit
    pub concurrency: Concurrency,
}

/// Owner of the persisted settings collection
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings through the persistence port, or start from defaults
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let settings = match storage.load(SETTINGS_KEY)? {
            Some(raw) => serde_yaml::from_str(&raw).context("failed to parse settings")?,
            None => Settings::default(),
        };
        Ok(Self { storage, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply a mutation and rewrite the whole collection
    pub fn update(&mut self, mutate: impl FnOnce(&mut Settings)) -> Result<()> {
        mutate(&mut self.settings);
        let raw = serde_yaml::to_string(&self.settings).context("failed to serialize settings")?;
        self.storage.save(SETTINGS_KEY, &raw)
    }
}
