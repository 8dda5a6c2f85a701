//! Key/value storage tiers backing the credential store.
//!
//! Two tiers exist: a session tier that lives as long as the process, and a
//! durable tier that survives restarts. Both speak the same string-keyed API.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-lifetime storage (the session tier).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// JSON-file storage (the durable tier).
///
/// The whole map is rewritten on every mutation through a temporary file and
/// a rename, so a crash mid-write leaves the previous contents in place.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "credential file is corrupt; starting empty");
                HashMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read credential file at {:?}", path));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create credential directory at {:?}", parent))?;
        }

        let payload = serde_json::to_string_pretty(entries).context("failed to serialize credentials")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload).with_context(|| format!("failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move {:?} into place", tmp))?;
        Ok(())
    }

    fn mutate(&self, op: &str, f: impl FnOnce(&mut HashMap<String, String>)) {
        let mut entries = self.entries.lock();
        f(&mut *entries);
        if let Err(err) = self.persist(&*entries) {
            tracing::error!("failed to {op} credential entry: {err:?}");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.mutate("store", |entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        if self.entries.lock().contains_key(key) {
            self.mutate("remove", |entries| {
                entries.remove(key);
            });
        }
    }
}

/// Resolve the default durable store location:
/// `{app_data_dir}/assursuite/credentials.json`.
pub fn default_credentials_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    Ok(base.join("assursuite").join("credentials.json"))
}
