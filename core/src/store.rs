//! Persistent key-value storage for the credential and generated images.
//!
//! [`FileStore`] keeps one JSON object at `$EASEL_HOME/storage.json`. Each
//! write replaces the file atomically and, on Unix, leaves it readable only
//! by the owner since it holds the API key.

use crate::record::GeneratedImageRecord;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::warn;

pub const STORAGE_FILENAME: &str = "storage.json";
pub const API_KEY_STORAGE_KEY: &str = "openrouter_api_key";
pub const IMAGES_STORAGE_KEY: &str = "ai_generated_images";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> io::Error {
    io::Error::other("store lock poisoned")
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens `<easel_home>/storage.json`, creating nothing until the first
    /// write. A missing file is an empty store.
    pub fn open(easel_home: &Path) -> io::Result<Self> {
        let path = easel_home.join(STORAGE_FILENAME);
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("failed to parse {}: {err}", path.display()),
                )
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path {} has no parent directory", self.path.display()),
            )
        })?;
        std::fs::create_dir_all(parent)?;

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::other(format!("failed to serialise store: {e}")))?;
        // Temp files are created 0600 on Unix; the rename keeps that mode.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    // The in-memory map only changes once the file on disk does.
    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.write(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.write(&next)?;
        *entries = next;
        Ok(())
    }
}

pub fn load_api_key(store: &dyn KeyValueStore) -> Option<String> {
    match store.get(API_KEY_STORAGE_KEY) {
        Ok(value) => value.filter(|key| !key.trim().is_empty()),
        Err(err) => {
            warn!("failed to read stored API key: {err}");
            None
        }
    }
}

/// Loads the persisted image list. Entries that fail to parse are skipped
/// and logged; an unreadable payload yields an empty list.
pub fn load_images(store: &dyn KeyValueStore) -> Vec<GeneratedImageRecord> {
    let raw = match store.get(IMAGES_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!("failed to read stored images: {err}");
            return Vec::new();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(err) => {
            warn!("failed to parse stored images: {err}");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("skipping malformed stored image: {err}");
                None
            }
        })
        .collect()
}

pub fn save_images(store: &dyn KeyValueStore, images: &[GeneratedImageRecord]) -> io::Result<()> {
    let raw = serde_json::to_string(images)
        .map_err(|e| io::Error::other(format!("failed to serialise images: {e}")))?;
    store.set(IMAGES_STORAGE_KEY, &raw)
}
