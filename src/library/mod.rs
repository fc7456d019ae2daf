use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::queue::Job;
use crate::store::Storage;
use crate::Result;

/// Storage key holding the serialized library
pub const LIBRARY_KEY: &str = "library.json";

/// An immutable record of a completed transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    pub file_name: String,
    /// Payload size in bytes; 0 when unknown (YouTube sources)
    pub file_size: u64,
    pub transcript: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub source_url: Option<String>,
}

impl LibraryItem {
    /// Snapshot a just-completed job, using whatever display name it carries
    /// now (video titles arrive asynchronously after enqueue)
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: job.display_name.clone(),
            file_size: job.file_size(),
            transcript: job.transcript.clone().unwrap_or_default(),
            created_at: Utc::now(),
            source: job.source.kind().to_string(),
            source_url: job.source.source_url().map(str::to_string),
        }
    }
}

/// Collection of completed transcripts, most recent first. Items are never
/// mutated after `add`; the whole set is rewritten through the persistence
/// port on every change.
pub struct Library {
    storage: Arc<dyn Storage>,
    items: Vec<LibraryItem>,
}

impl Library {
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let items = match storage.load(LIBRARY_KEY)? {
            Some(raw) => serde_json::from_str(&raw).context("failed to parse library")?,
            None => Vec::new(),
        };
        Ok(Self { storage, items })
    }

    pub fn items(&self) -> &[LibraryItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&LibraryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(&mut self, item: LibraryItem) -> Result<()> {
        self.items.insert(0, item);
        self.persist()
    }

    /// Delete one item; returns whether anything was removed
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    /// Every stored transcript as one text blob: a fixed header block per
    /// item (filename, source, creation time) followed by the transcript,
    /// double-newline separated
    pub fn export_all(&self) -> String {
        self.items
            .iter()
            .map(|item| {
                let source = match &item.source_url {
                    Some(url) => format!("{} ({url})", item.source),
                    None => item.source.clone(),
                };
                format!(
                    "===== {} =====\nSource: {}\nCreated: {}\n\n{}",
                    item.file_name,
                    source,
                    item.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    item.transcript
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.items).context("failed to serialize library")?;
        self.storage.save(LIBRARY_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    fn item(name: &str, transcript: &str) -> LibraryItem {
        LibraryItem {
            id: Uuid::new_v4().to_string(),
            file_name: name.to_string(),
            file_size: 0,
            transcript: transcript.to_string(),
            created_at: Utc::now(),
            source: "youtube".to_string(),
            source_url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
        }
    }

    #[test]
    fn add_prepends_most_recent_first() {
        let mut library = Library::open(Arc::new(MemoryStorage::new())).unwrap();
        library.add(item("first", "a")).unwrap();
        library.add(item("second", "b")).unwrap();
        let names: Vec<&str> = library.items().iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, ["second", "first"]);
    }

    #[test]
    fn items_survive_reopen() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let mut library = Library::open(storage.clone() as Arc<dyn Storage>).unwrap();
            library.add(item("kept", "text")).unwrap();
        }
        let reopened = Library::open(storage as Arc<dyn Storage>).unwrap();
        assert_eq!(reopened.items().len(), 1);
        assert_eq!(reopened.items()[0].file_name, "kept");
    }

    #[test]
    fn remove_and_clear() {
        let mut library = Library::open(Arc::new(MemoryStorage::new())).unwrap();
        library.add(item("a", "1")).unwrap();
        library.add(item("b", "2")).unwrap();
        let id = library.items()[0].id.clone();

        assert!(library.remove(&id).unwrap());
        assert!(!library.remove(&id).unwrap());
        assert_eq!(library.items().len(), 1);

        library.clear().unwrap();
        assert!(library.items().is_empty());
    }

    #[test]
    fn export_blocks_carry_header_and_transcript() {
        let mut library = Library::open(Arc::new(MemoryStorage::new())).unwrap();
        library.add(item("Talk One", "hello world")).unwrap();
        library.add(item("Talk Two", "general kenobi")).unwrap();

        let blob = library.export_all();
        assert!(blob.starts_with("===== Talk Two ====="));
        assert!(blob.contains("Source: youtube (https://youtu.be/dQw4w9WgXcQ)"));
        assert!(blob.contains("Created: "));
        assert!(blob.contains("\n\nhello world"));
        assert!(blob.contains("general kenobi\n\n====="));
    }

    #[test]
    fn export_of_empty_library_is_empty() {
        let library = Library::open(Arc::new(MemoryStorage::new())).unwrap();
        assert_eq!(library.export_all(), "");
    }
}
