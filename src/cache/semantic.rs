//! Semantic response cache: cosine-similarity scan over embeddings.
//!
//! Entries hold unit-L2 embeddings of a fixed dimension, so similarity
//! is a dot product. `find_similar` returns the single best non-expired,
//! model-compatible entry at or above the caller's similarity floor,
//! never below it, regardless of embedding quality.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::{response_bytes, ENTRY_OVERHEAD_BYTES};
use crate::embedding::{cosine_similarity, l2_normalize};
use crate::telemetry;
use crate::types::CompletionResponse;

/// Configuration for the semantic cache.
#[derive(Debug, Clone)]
pub struct SemanticCacheConfig {
    /// Embedding dimensionality. Default: 128.
    pub dimensions: usize,
    /// Maximum number of entries before pressure eviction. Default: 200.
    pub max_entries: usize,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            dimensions: 128,
            max_entries: 200,
        }
    }
}

/// Snapshot of semantic-cache counters.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SemanticCacheStats {
    pub total_entries: usize,
    pub dimensions: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired_on_last_sweep: u64,
    /// Rough heap footprint: per-entry overhead + 8·D + two bytes per
    /// stored string character.
    pub memory_bytes: usize,
}

struct SemanticEntry {
    embedding: Vec<f32>,
    response: Arc<CompletionResponse>,
    query: String,
    system_prompt: Option<String>,
    /// Model the entry was produced by; `None` matches any request.
    model: Option<String>,
    expires_at: Instant,
}

/// A successful semantic lookup.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub response: Arc<CompletionResponse>,
    pub similarity: f32,
}

/// Cosine-similarity cache over response embeddings.
pub struct SemanticCache {
    entries: RwLock<Vec<SemanticEntry>>,
    dimensions: usize,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expired_on_last_sweep: AtomicU64,
}

impl SemanticCache {
    pub fn new(config: SemanticCacheConfig) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            dimensions: config.dimensions,
            max_entries: config.max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired_on_last_sweep: AtomicU64::new(0),
        }
    }

    /// Find the best entry for a query embedding.
    ///
    /// Skips expired entries and entries recorded against a different
    /// model. Returns the single highest-similarity candidate at or
    /// above `min_similarity`, or `None`.
    pub fn find_similar(
        &self,
        query_embedding: &[f32],
        model: Option<&str>,
        min_similarity: f32,
    ) -> Option<SemanticHit> {
        let mut query = query_embedding.to_vec();
        l2_normalize(&mut query);

        let now = Instant::now();
        let entries = self.entries.read();

        let mut best: Option<(usize, f32)> = None;
        for (idx, entry) in entries.iter().enumerate() {
            if entry.expires_at <= now {
                continue;
            }
            if let (Some(entry_model), Some(requested)) = (entry.model.as_deref(), model) {
                if entry_model != requested {
                    continue;
                }
            }
            let similarity = cosine_similarity(&query, &entry.embedding);
            if similarity < min_similarity {
                continue;
            }
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((idx, similarity));
            }
        }

        match best {
            Some((idx, similarity)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "semantic").increment(1);
                Some(SemanticHit {
                    response: Arc::clone(&entries[idx].response),
                    similarity,
                })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "semantic").increment(1);
                None
            }
        }
    }

    /// Insert an entry. The embedding is normalized on the way in;
    /// vectors of the wrong dimensionality are rejected with a log line
    /// rather than poisoning lookups.
    pub fn insert(
        &self,
        embedding: Vec<f32>,
        query: impl Into<String>,
        system_prompt: Option<String>,
        model: Option<String>,
        response: Arc<CompletionResponse>,
        ttl: Duration,
    ) {
        if embedding.len() != self.dimensions {
            debug!(
                got = embedding.len(),
                expected = self.dimensions,
                "dropping semantic entry with wrong embedding dimension"
            );
            return;
        }
        let mut embedding = embedding;
        l2_normalize(&mut embedding);

        let entry = SemanticEntry {
            embedding,
            response,
            query: query.into(),
            system_prompt,
            model,
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.entries.write();
        entries.push(entry);
        if entries.len() > self.max_entries {
            // Prefer reclaiming expired entries, then the soonest-expiring.
            let now = Instant::now();
            entries.retain(|e| e.expires_at > now);
            while entries.len() > self.max_entries {
                let victim = entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(i, _)| i);
                match victim {
                    Some(i) => {
                        entries.swap_remove(i);
                    }
                    None => break,
                }
            }
        }
    }

    /// Remove expired entries now; returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.expires_at > now);
        let removed = before - entries.len();
        self.expired_on_last_sweep
            .store(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn stats(&self) -> SemanticCacheStats {
        let entries = self.entries.read();
        let memory_bytes = entries
            .iter()
            .map(|e| {
                ENTRY_OVERHEAD_BYTES
                    + 8 * self.dimensions
                    + response_bytes(&e.response)
                    + 2 * (e.query.len() + e.system_prompt.as_deref().map_or(0, str::len))
            })
            .sum();
        SemanticCacheStats {
            total_entries: entries.len(),
            dimensions: self.dimensions,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_on_last_sweep: self.expired_on_last_sweep.load(Ordering::Relaxed),
            memory_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Provider, Usage};

    fn response(text: &str) -> Arc<CompletionResponse> {
        Arc::new(CompletionResponse::completed(
            text,
            "test-model",
            Provider::Claude,
            Usage::new(10, 5),
            Duration::from_millis(50),
        ))
    }

    fn cache(dims: usize) -> SemanticCache {
        SemanticCache::new(SemanticCacheConfig {
            dimensions: dims,
            max_entries: 8,
        })
    }

    #[test]
    fn finds_best_match_above_floor() {
        let cache = cache(2);
        cache.insert(
            vec![1.0, 0.0],
            "q1",
            None,
            None,
            response("aligned"),
            Duration::from_secs(60),
        );
        cache.insert(
            vec![0.6, 0.8],
            "q2",
            None,
            None,
            response("off-axis"),
            Duration::from_secs(60),
        );

        let hit = cache
            .find_similar(&[1.0, 0.0], None, 0.5)
            .expect("expected a hit");
        assert_eq!(hit.response.text, "aligned");
        assert!((hit.similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn never_returns_below_floor() {
        let cache = cache(2);
        cache.insert(
            vec![0.0, 1.0],
            "q",
            None,
            None,
            response("orthogonal"),
            Duration::from_secs(60),
        );

        assert!(cache.find_similar(&[1.0, 0.0], None, 0.5).is_none());
    }

    #[test]
    fn filters_by_model_when_entry_recorded_one() {
        let cache = cache(2);
        cache.insert(
            vec![1.0, 0.0],
            "q",
            None,
            Some("model-a".into()),
            response("a"),
            Duration::from_secs(60),
        );

        assert!(cache.find_similar(&[1.0, 0.0], Some("model-b"), 0.5).is_none());
        assert!(cache.find_similar(&[1.0, 0.0], Some("model-a"), 0.5).is_some());
    }

    #[test]
    fn model_free_entry_matches_any_request() {
        let cache = cache(2);
        cache.insert(
            vec![1.0, 0.0],
            "q",
            None,
            None,
            response("any"),
            Duration::from_secs(60),
        );

        assert!(cache.find_similar(&[1.0, 0.0], Some("model-x"), 0.5).is_some());
    }

    #[test]
    fn expired_entries_are_skipped() {
        let cache = cache(2);
        cache.insert(
            vec![1.0, 0.0],
            "q",
            None,
            None,
            response("stale"),
            Duration::from_millis(1),
        );
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.find_similar(&[1.0, 0.0], None, 0.5).is_none());
        assert_eq!(cache.sweep(), 1);
    }

    #[test]
    fn wrong_dimension_insert_is_dropped() {
        let cache = cache(4);
        cache.insert(
            vec![1.0, 0.0],
            "q",
            None,
            None,
            response("bad"),
            Duration::from_secs(60),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_pressure_evicts_soonest_expiring() {
        let cache = SemanticCache::new(SemanticCacheConfig {
            dimensions: 2,
            max_entries: 2,
        });
        cache.insert(
            vec![1.0, 0.0],
            "short",
            None,
            None,
            response("short-lived"),
            Duration::from_secs(10),
        );
        cache.insert(
            vec![0.0, 1.0],
            "long",
            None,
            None,
            response("long-lived"),
            Duration::from_secs(600),
        );
        cache.insert(
            vec![0.7, 0.7],
            "newer",
            None,
            None,
            response("newer"),
            Duration::from_secs(600),
        );

        assert_eq!(cache.len(), 2);
        assert!(cache.find_similar(&[0.0, 1.0], None, 0.9).is_some());
        // The soonest-expiring entry was the victim.
        assert!(cache.find_similar(&[1.0, 0.0], None, 0.99).is_none());
    }

    #[test]
    fn stats_include_dimension_term() {
        let cache = cache(16);
        cache.insert(
            vec![0.0; 16],
            "q",
            None,
            None,
            response("r"),
            Duration::from_secs(60),
        );
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert!(stats.memory_bytes >= ENTRY_OVERHEAD_BYTES + 8 * 16);
    }
}
