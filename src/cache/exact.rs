//! Exact-match response cache: LRU with per-entry TTL.
//!
//! Keyed by a stable hash of the canonical request (model, rounded
//! temperature, system prompt, prompt). `get` treats expired entries as
//! misses and evicts them; a periodic sweeper clears the rest. At
//! capacity the least-recently-used entry is evicted; admitted entries
//! are otherwise never dropped before their TTL.
//!
//! An optional durable mirror snapshots non-expired entries through a
//! [`PersistentStore`] under a single namespace; the mirror only affects
//! persistence across restarts, never lookup semantics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::store::{unix_ms, CacheSnapshot, PersistentStore, SnapshotEntry};
use super::{response_bytes, ENTRY_OVERHEAD_BYTES};
use crate::telemetry;
use crate::types::CompletionResponse;

/// Default interval between sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Compute the canonical cache key for a request.
///
/// Temperature is rounded to two decimals so float noise does not split
/// otherwise-identical requests. SHA-256 keeps the key stable across
/// processes, which the durable mirror depends on.
pub fn exact_key(model: &str, temperature: f32, system_prompt: Option<&str>, prompt: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{temperature:.2}").as_bytes());
    hasher.update([0u8]);
    hasher.update(system_prompt.unwrap_or("").as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());

    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Configuration for the exact cache.
#[derive(Debug, Clone)]
pub struct ExactCacheConfig {
    /// Maximum number of entries before LRU eviction. Default: 100.
    pub max_entries: usize,
    /// Namespace for the durable mirror blob.
    pub namespace: String,
}

impl Default for ExactCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            namespace: "muninn-exact".to_string(),
        }
    }
}

/// Snapshot of exact-cache counters.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ExactCacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired_on_last_sweep: u64,
    /// Rough heap footprint: fixed per-entry overhead plus two bytes per
    /// stored string character.
    pub memory_bytes: usize,
}

struct ExactEntry {
    response: Arc<CompletionResponse>,
    expires_at: Instant,
    expires_unix_ms: u64,
    last_access: AtomicU64,
}

struct Shared {
    entries: RwLock<HashMap<u64, ExactEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    access_counter: AtomicU64,
    expired_on_last_sweep: AtomicU64,
    max_entries: usize,
    store: Option<Arc<dyn PersistentStore>>,
    namespace: String,
}

impl Shared {
    /// Remove expired entries and refresh the mirror.
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, e| e.expires_at > now);
            before - entries.len()
        };
        self.expired_on_last_sweep
            .store(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, "exact cache sweep");
        }
        self.persist();
        removed
    }

    /// Serialize non-expired entries to the durable mirror, when one is
    /// configured. Persistence failures are logged and swallowed.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = {
            let entries = self.entries.read();
            let now = Instant::now();
            CacheSnapshot::new(
                entries
                    .iter()
                    .filter(|(_, e)| e.expires_at > now)
                    .map(|(key, e)| SnapshotEntry {
                        key: *key,
                        response: (*e.response).clone(),
                        expires_unix_ms: e.expires_unix_ms,
                    })
                    .collect(),
            )
        };
        let blob = match snapshot.encode() {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "failed to encode exact cache snapshot");
                return;
            }
        };
        if let Err(e) = store.save(&self.namespace, &blob) {
            warn!(error = %e, namespace = %self.namespace, "failed to persist exact cache");
        }
    }
}

/// Exact-match LRU cache with per-entry TTL.
pub struct ExactCache {
    shared: Arc<Shared>,
    sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ExactCache {
    /// Create a cache without a durable mirror.
    pub fn new(config: ExactCacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a cache backed by a durable mirror, reloading any
    /// non-expired snapshot stored under the configured namespace.
    pub fn with_store(config: ExactCacheConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self::build(config, Some(store))
    }

    fn build(config: ExactCacheConfig, store: Option<Arc<dyn PersistentStore>>) -> Self {
        let mut entries = HashMap::new();
        if let Some(store) = &store {
            match store.load(&config.namespace) {
                Ok(Some(blob)) => {
                    let now_ms = unix_ms();
                    let now = Instant::now();
                    for entry in CacheSnapshot::decode(&blob) {
                        let remaining =
                            Duration::from_millis(entry.expires_unix_ms.saturating_sub(now_ms));
                        if remaining.is_zero() {
                            continue;
                        }
                        entries.insert(
                            entry.key,
                            ExactEntry {
                                response: Arc::new(entry.response),
                                expires_at: now + remaining,
                                expires_unix_ms: entry.expires_unix_ms,
                                last_access: AtomicU64::new(0),
                            },
                        );
                    }
                    debug!(entries = entries.len(), "reloaded exact cache snapshot");
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to load exact cache snapshot"),
            }
        }

        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(entries),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                access_counter: AtomicU64::new(0),
                expired_on_last_sweep: AtomicU64::new(0),
                max_entries: config.max_entries.max(1),
                store,
                namespace: config.namespace,
            }),
            sweeper: parking_lot::Mutex::new(None),
        }
    }

    /// Look up a response. Expired entries are evicted and count as
    /// misses.
    pub fn get(&self, key: u64) -> Option<Arc<CompletionResponse>> {
        let now = Instant::now();
        {
            let entries = self.shared.entries.read();
            if let Some(entry) = entries.get(&key) {
                if entry.expires_at > now {
                    let stamp = self.shared.access_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    entry.last_access.store(stamp, Ordering::Relaxed);
                    self.shared.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "exact").increment(1);
                    return Some(Arc::clone(&entry.response));
                }
            } else {
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "exact").increment(1);
                return None;
            }
        }

        // Present but expired: evict under the write lock.
        let mut entries = self.shared.entries.write();
        if entries.get(&key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(&key);
        }
        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "exact").increment(1);
        None
    }

    /// Insert a response with the given TTL, evicting the
    /// least-recently-used entry at capacity.
    pub fn set(&self, key: u64, response: Arc<CompletionResponse>, ttl: Duration) {
        let stamp = self.shared.access_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = ExactEntry {
            response,
            expires_at: Instant::now() + ttl,
            expires_unix_ms: unix_ms() + ttl.as_millis() as u64,
            last_access: AtomicU64::new(stamp),
        };

        {
            let mut entries = self.shared.entries.write();
            entries.insert(key, entry);
            while entries.len() > self.shared.max_entries {
                let lru = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                    .map(|(k, _)| *k);
                match lru {
                    Some(k) => entries.remove(&k),
                    None => break,
                };
            }
        }
        self.shared.persist();
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.shared.entries.write().clear();
        self.shared.persist();
    }

    /// Remove expired entries now; returns the number removed.
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ExactCacheStats {
        let entries = self.shared.entries.read();
        let memory_bytes = entries
            .values()
            .map(|e| ENTRY_OVERHEAD_BYTES + response_bytes(&e.response))
            .sum();
        ExactCacheStats {
            total_entries: entries.len(),
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            expired_on_last_sweep: self.shared.expired_on_last_sweep.load(Ordering::Relaxed),
            memory_bytes,
        }
    }

    /// Start the periodic sweeper. Idempotent; the task stops when the
    /// cache is dropped.
    pub fn start_sweeper(&self, period: Duration) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(shared) => {
                        shared.sweep();
                    }
                    None => break,
                }
            }
        }));
    }
}

impl Drop for ExactCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}
