use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::SettingsStore;

/// A named credential for the transcription backend
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub id: String,
    pub name: String,
    pub key: String,
}

impl ApiKeyEntry {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            key: key.into(),
        }
    }
}

// Secrets must never land in logs
impl std::fmt::Debug for ApiKeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key", &mask_key(&self.key))
            .finish()
    }
}

/// Mask a secret for display, keeping only a short tail
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

/// Resolve the transcription key: the active configured entry, else the
/// system-wide default, else empty
pub fn resolve_transcription_key(
    active_id: Option<&str>,
    entries: &[ApiKeyEntry],
    system_default: Option<&str>,
) -> String {
    if let Some(id) = active_id {
        if let Some(entry) = entries.iter().find(|e| e.id == id) {
            return entry.key.clone();
        }
    }
    system_default.unwrap_or("").to_string()
}

/// Read-fresh provider of the credentials a scheduling pass needs.
/// Nothing is cached beyond the persisted values themselves.
pub trait KeyProvider: Send + Sync {
    /// Transcription backend key; empty when nothing is configured
    fn transcription_key(&self) -> String;

    /// Premium caption strategy key, when one is set
    fn caption_key(&self) -> Option<String>;
}

/// Key provider backed by the persisted settings
pub struct SettingsKeys {
    store: Arc<Mutex<SettingsStore>>,
    default_override: Option<String>,
}

impl SettingsKeys {
    pub fn new(store: Arc<Mutex<SettingsStore>>) -> Self {
        Self {
            store,
            default_override: None,
        }
    }

    /// Use this value as the system-wide default for the current run, without
    /// persisting it
    pub fn with_default_override(mut self, key: Option<String>) -> Self {
        self.default_override = key.filter(|k| !k.is_empty());
        self
    }
}

impl KeyProvider for SettingsKeys {
    fn transcription_key(&self) -> String {
        let store = self.store.lock().expect("settings store lock poisoned");
        let settings = store.settings();
        let default = self
            .default_override
            .as_deref()
            .or(settings.default_api_key.as_deref());
        resolve_transcription_key(settings.active_key_id.as_deref(), &settings.api_keys, default)
    }

    fn caption_key(&self) -> Option<String> {
        let store = self.store.lock().expect("settings store lock poisoned");
        store
            .settings()
            .caption_api_key
            .clone()
            .filter(|k| !k.is_empty())
    }
}

/// Fixed credentials, for one-shot runs and tests
pub struct FixedKeys {
    pub transcription: String,
    pub caption: Option<String>,
}

impl KeyProvider for FixedKeys {
    fn transcription_key(&self) -> String {
        self.transcription.clone()
    }

    fn caption_key(&self) -> Option<String> {
        self.caption.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_entry_wins_over_default() {
        let entries = vec![
            ApiKeyEntry::new("personal", "key-a"),
            ApiKeyEntry::new("work", "key-b"),
        ];
        let active = entries[1].id.clone();
        let resolved = resolve_transcription_key(Some(&active), &entries, Some("fallback"));
        assert_eq!(resolved, "key-b");
    }

    #[test]
    fn unknown_active_id_falls_back_to_default() {
        let entries = vec![ApiKeyEntry::new("personal", "key-a")];
        let resolved = resolve_transcription_key(Some("missing"), &entries, Some("fallback"));
        assert_eq!(resolved, "fallback");
    }

    #[test]
    fn nothing_configured_resolves_empty() {
        assert_eq!(resolve_transcription_key(None, &[], None), "");
    }

    #[test]
    fn masked_keys_keep_only_the_tail() {
        assert_eq!(mask_key("secret-key-1234"), "****1234");
        assert_eq!(mask_key("ab"), "****");
        let debugged = format!("{:?}", ApiKeyEntry::new("work", "secret-key-1234"));
        assert!(!debugged.contains("secret-key"));
        assert!(debugged.contains("****1234"));
    }
}
