use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::Result;

/// Persistence port for locally stored state.
///
/// Each key holds one serialized collection, read once at startup and
/// rewritten in full on every mutation.
pub trait Storage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed storage, one file per key under the user's config directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("could not determine config directory")?
            .join("scribeq");
        Ok(Self { dir })
    }

    /// Storage rooted at an explicit directory
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs_err::read_to_string(&path).context("failed to read stored state")?;
        Ok(Some(raw))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs_err::create_dir_all(&self.dir)?;
        fs_err::write(self.path_for(key), value).context("failed to write stored state")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs_err::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-memory storage for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().expect("storage lock poisoned").get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("storage lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().expect("storage lock poisoned").remove(key);
        Ok(())
    }
}
