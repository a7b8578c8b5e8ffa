#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Durable, keyed artifact store backing the resumable ingestion pipeline.
//!
//! Every artifact is a versioned JSON envelope written with
//! write-to-tempfile + atomic rename, so a reader only ever observes an
//! entry that corresponds exactly to some completed [`DurableCache::save`]
//! call. Truncated or legacy entries are rejected deliberately rather than
//! silently misparsed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Incompatible artifact '{key}': format version {found}, expected {expected}")]
    Incompatible { key: String, found: u32, expected: u32 },

    #[error("Corrupt artifact '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization failed for '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    kind: String,
    created_at: i64,
    payload: serde_json::Value,
}

/// Filesystem-backed cache addressed by string keys.
///
/// Workers may write concurrently as long as each writes only keys it owns;
/// the atomic-rename protocol keeps concurrent readers safe without locks.
#[derive(Clone, Debug)]
pub struct DurableCache {
    root: PathBuf,
}

impl DurableCache {
    /// Opens (creating if needed) a cache rooted at the provided directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Persists `value` under `key` atomically. An interrupted save leaves
    /// at most a stray tempfile, never a partial entry under `key`.
    pub fn save<T: Serialize>(&self, key: &str, kind: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_value(value).map_err(|e| CacheError::Serialize {
            key: key.to_string(),
            source: e,
        })?;
        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            kind: kind.to_string(),
            created_at: Utc::now().timestamp_millis(),
            payload,
        };
        let data = serde_json::to_vec(&envelope).map_err(|e| CacheError::Serialize {
            key: key.to_string(),
            source: e,
        })?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.entry_path(key)).map_err(|e| e.error)?;
        tracing::debug!(key, kind, bytes = data.len(), "cache entry saved");
        Ok(())
    }

    /// Loads the artifact stored under `key`, verifying the envelope's
    /// format version and kind before touching the payload.
    pub fn load<T: DeserializeOwned>(&self, key: &str, kind: &str) -> Result<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        let data = fs::read(&path)?;
        let envelope: Envelope =
            serde_json::from_slice(&data).map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(CacheError::Incompatible {
                key: key.to_string(),
                found: envelope.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if envelope.kind != kind {
            return Err(CacheError::Corrupt {
                key: key.to_string(),
                reason: format!("kind '{}' does not match expected '{kind}'", envelope.kind),
            });
        }
        serde_json::from_value(envelope.payload).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Like [`DurableCache::load`], but treats corrupt or incompatible
    /// entries as missing so the caller recomputes them.
    pub fn load_or_missing<T: DeserializeOwned>(&self, key: &str, kind: &str) -> Result<Option<T>> {
        match self.load(key, kind) {
            Ok(value) => Ok(Some(value)),
            Err(CacheError::NotFound(_)) => Ok(None),
            Err(err @ (CacheError::Corrupt { .. } | CacheError::Incompatible { .. })) => {
                tracing::warn!(key, %err, "ignoring unusable cache entry");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    /// Lists all keys with a completed entry, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
