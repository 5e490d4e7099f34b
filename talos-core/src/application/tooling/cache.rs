//! Content-addressed cache for tool results.
//!
//! Keys are a pure function of tool name and argument content: the
//! arguments serialize through `serde_json::Map` (BTree-backed, so keys
//! are emitted sorted regardless of insertion order) and the digest is
//! SHA-256 over `tool_name \n canonical_json`. Entries are immutable and
//! never evicted; a racing redundant write stores the same bytes.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::JsonMap;

/// Deterministic digest for a (tool name, arguments) pair.
///
/// # Panics
///
/// Panics if the arguments cannot be serialized to JSON, which cannot
/// happen for a well-formed `JsonMap`.
pub fn cache_key(tool_name: &str, args: &JsonMap) -> String {
    let canonical = serde_json::to_vec(&Value::Object(args.clone()))
        .expect("tool arguments are always serializable JSON");

    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io failure at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache entry at {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache entry could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ToolCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<JsonMap>, CacheError>;

    async fn put(&self, key: &str, data: &JsonMap) -> Result<(), CacheError>;
}

/// Process-local cache, used in tests and for cache-less wiring.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, JsonMap>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<JsonMap>, CacheError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: &JsonMap) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), data.clone());
        Ok(())
    }
}

/// Durable cache shared across runs: one JSON file per digest.
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await.map_err(|source| CacheError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl ToolCache for FsCache {
    async fn get(&self, key: &str) -> Result<Option<JsonMap>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let data =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt { path, source })?;
        Ok(Some(data))
    }

    async fn put(&self, key: &str, data: &JsonMap) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(data)?;
        write_atomic(&self.entry_path(key), &bytes).await
    }
}
