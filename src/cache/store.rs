//! Snapshot persistence for the response cache.
//!
//! The cache is authoritative in memory. After each write it hands a full
//! [`CacheSnapshot`] to its [`CacheStore`] on a spawned task; at boot,
//! [`ResponseCache::restore`](super::ResponseCache::restore) reads the last
//! snapshot back. Store failures never reach the request path.
//!
//! Backends:
//!
//! - [`MemoryStore`] - keeps nothing; the default.
//! - [`FileStore`] - one JSON file, replaced atomically via rename.
//! - `RedisStore` - one JSON string under a key (feature `redis`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{HuginnError, Result};

use super::entry::CacheEntry;

/// Point-in-time copy of every cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Increases with every write, so a store can drop a snapshot that
    /// arrives after a newer one.
    pub generation: u64,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<CacheEntry>,
}

/// Durable backing for cache snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    /// Whether writes are kept. The cache skips building snapshots for
    /// stores that return `false`.
    fn is_durable(&self) -> bool {
        true
    }

    /// Persist a snapshot, replacing the previous one.
    async fn write(&self, snapshot: &CacheSnapshot) -> Result<()>;

    /// The last persisted snapshot, if any.
    async fn read(&self) -> Result<Option<CacheSnapshot>>;
}

/// Store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStore;

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn write(&self, _snapshot: &CacheSnapshot) -> Result<()> {
        Ok(())
    }

    async fn read(&self) -> Result<Option<CacheSnapshot>> {
        Ok(None)
    }
}

/// Snapshot kept as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Generation of the last snapshot written.
    written: Mutex<u64>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn write(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let mut written = self.written.lock().await;
        if snapshot.generation <= *written {
            return Ok(());
        }

        let json = serde_json::to_vec(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        *written = snapshot.generation;
        Ok(())
    }

    async fn read(&self) -> Result<Option<CacheSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| HuginnError::CachePersistence(format!("{}: {e}", self.path.display())))?;
        *self.written.lock().await = snapshot.generation;
        Ok(Some(snapshot))
    }
}

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::fmt;

    use async_trait::async_trait;
    use redis::AsyncCommands;
    use redis::aio::ConnectionManager;
    use tokio::sync::Mutex;

    use super::{CacheSnapshot, CacheStore};
    use crate::{HuginnError, Result};

    /// Snapshot kept as a JSON string in redis.
    pub struct RedisStore {
        connection: ConnectionManager,
        key: String,
        written: Mutex<u64>,
    }

    impl fmt::Debug for RedisStore {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RedisStore")
                .field("key", &self.key)
                .field("connection", &"<ConnectionManager>")
                .finish()
        }
    }

    impl RedisStore {
        /// Connect to `url` and store the snapshot under `key`.
        pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self> {
            let client = redis::Client::open(url)
                .map_err(|e| HuginnError::CachePersistence(format!("redis client: {e}")))?;
            let connection = ConnectionManager::new(client)
                .await
                .map_err(|e| HuginnError::CachePersistence(format!("redis connect: {e}")))?;
            Ok(Self {
                connection,
                key: key.into(),
                written: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl CacheStore for RedisStore {
        fn name(&self) -> &str {
            "redis"
        }

        async fn write(&self, snapshot: &CacheSnapshot) -> Result<()> {
            let mut written = self.written.lock().await;
            if snapshot.generation <= *written {
                return Ok(());
            }
            let json = serde_json::to_string(snapshot)?;
            let mut conn = self.connection.clone();
            let _: () = conn
                .set(&self.key, json)
                .await
                .map_err(|e| HuginnError::CachePersistence(format!("redis set: {e}")))?;
            *written = snapshot.generation;
            Ok(())
        }

        async fn read(&self) -> Result<Option<CacheSnapshot>> {
            let mut conn = self.connection.clone();
            let json: Option<String> = conn
                .get(&self.key)
                .await
                .map_err(|e| HuginnError::CachePersistence(format!("redis get: {e}")))?;
            match json {
                Some(json) => {
                    let snapshot: CacheSnapshot = serde_json::from_str(&json)?;
                    *self.written.lock().await = snapshot.generation;
                    Ok(Some(snapshot))
                }
                None => Ok(None),
            }
        }
    }
}
