//! Pluggable persistence for the exact cache's durable mirror.
//!
//! The mirror is optional: disabling it changes persistence across
//! restarts, never request semantics. Each cache namespace serializes to
//! one opaque blob with a version field; unknown fields are ignored on
//! load and a schema mismatch or corrupt blob starts the cache empty.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::CompletionResponse;
use crate::{MuninnError, Result};

/// Current snapshot schema version.
pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// Key-value persistence capability.
///
/// Implementations must be `Send + Sync`; writes happen from the cache's
/// sweeper task and after cache stores.
pub trait PersistentStore: Send + Sync {
    /// Load the blob stored under `namespace`, if any.
    fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `namespace`.
    fn save(&self, namespace: &str, blob: &[u8]) -> Result<()>;
}

/// In-memory store, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(namespace).cloned())
    }

    fn save(&self, namespace: &str, blob: &[u8]) -> Result<()> {
        self.blobs.lock().insert(namespace.to_string(), blob.to_vec());
        Ok(())
    }
}

/// Directory-backed store: one file per namespace.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| MuninnError::Configuration(format!("cache dir: {e}")))?;
        Ok(Self { dir })
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        // Namespaces are caller-chosen; keep filenames tame.
        let safe: String = namespace
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl PersistentStore for FileStore {
    fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(namespace)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MuninnError::Configuration(format!("cache read: {e}"))),
        }
    }

    fn save(&self, namespace: &str, blob: &[u8]) -> Result<()> {
        std::fs::write(self.path_for(namespace), blob)
            .map_err(|e| MuninnError::Configuration(format!("cache write: {e}")))
    }
}

/// One persisted exact-cache entry. Expiry is wall-clock so snapshots
/// survive process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotEntry {
    pub key: u64,
    pub response: CompletionResponse,
    pub expires_unix_ms: u64,
}

/// Versioned snapshot blob for one cache namespace.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheSnapshot {
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<SnapshotEntry>,
}

impl CacheSnapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot blob, filtering entries that expired on the
    /// wall clock. Corruption or a version mismatch yields an empty
    /// snapshot rather than an error.
    pub fn decode(blob: &[u8]) -> Vec<SnapshotEntry> {
        let snapshot: CacheSnapshot = match serde_json::from_slice(blob) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "discarding corrupt cache snapshot");
                return Vec::new();
            }
        };
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "discarding cache snapshot with mismatched schema"
            );
            return Vec::new();
        }
        let now = unix_ms();
        snapshot
            .entries
            .into_iter()
            .filter(|e| e.expires_unix_ms > now)
            .collect()
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
