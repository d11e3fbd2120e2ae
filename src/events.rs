//! Analytics events: append-only, best-effort.
//!
//! The executor tags everything it does with an [`AnalyticsEvent`] and
//! hands it to an [`EventSink`]. Emission is fire-and-forget: sinks must
//! not block, and dropping events under pressure is acceptable:
//! shipping them anywhere is a separate concern.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::store::unix_ms;

/// Event name: exact-cache hit.
pub const EV_CACHE_HIT: &str = "cache_hit";
/// Event name: semantic-cache hit.
pub const EV_SEMANTIC_CACHE_HIT: &str = "semantic_cache_hit";
/// Event name: semantic-cache miss.
pub const EV_SEMANTIC_CACHE_MISS: &str = "semantic_cache_miss";
/// Event name: the router picked a model.
pub const EV_SMART_ROUTING: &str = "smart_routing";
/// Event name: a provider call completed.
pub const EV_API_CALL: &str = "api_call";
/// Event name: a provider rate limit was hit.
pub const EV_RATE_LIMITED: &str = "rate_limited";
/// Event name: a request exceeded its deadline.
pub const EV_REQUEST_TIMEOUT: &str = "request_timeout";
/// Event name: a request failed terminally.
pub const EV_REQUEST_FAILED: &str = "request_failed";
/// Event name: the parser callback rejected a completion.
pub const EV_PARSING_ERROR: &str = "parsing_error";
/// Event name: a completion was written to a cache tier.
pub const EV_STORE_IN_CACHE: &str = "store_in_cache";

/// Coarse event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Request,
    Response,
    Error,
    Mcp,
    Feedback,
}

/// One analytics record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub category: EventCategory,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    pub timestamp_unix_ms: u64,
}

impl AnalyticsEvent {
    pub fn new(category: EventCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            model: None,
            payload: serde_json::Value::Null,
            timestamp_unix_ms: unix_ms(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Append-only event consumer.
///
/// `emit` must return promptly; implementations queue or drop rather
/// than block request processing.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}

/// Bounded in-memory sink for tests and debugging.
///
/// Keeps the most recent `capacity` events; older ones are dropped.
pub struct MemorySink {
    events: Mutex<VecDeque<AnalyticsEvent>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of retained events, oldest first.
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Names of retained events, oldest first.
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: AnalyticsEvent) {
        let mut events = self.events.lock();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Aggregated view of the event stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollupSummary {
    pub total_events: u64,
    pub counts_by_name: BTreeMap<String, u64>,
    /// Cache hits over hits + provider calls.
    pub cache_hit_rate: f64,
    pub tokens_saved: u64,
    pub cost_saved: f64,
}

/// Sink that folds events into running counters.
///
/// Wrap it in an `Arc` and register it alongside (or instead of) a
/// shipping sink to answer "what has the cache bought us" queries.
#[derive(Default)]
pub struct AnalyticsRollup {
    counts: Mutex<BTreeMap<String, u64>>,
    total: AtomicU64,
    cache_hits: AtomicU64,
    api_calls: AtomicU64,
    tokens_saved: AtomicU64,
    cost_saved: Mutex<f64>,
}

impl AnalyticsRollup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> RollupSummary {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let calls = self.api_calls.load(Ordering::Relaxed);
        let denominator = hits + calls;
        RollupSummary {
            total_events: self.total.load(Ordering::Relaxed),
            counts_by_name: self.counts.lock().clone(),
            cache_hit_rate: if denominator == 0 {
                0.0
            } else {
                hits as f64 / denominator as f64
            },
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            cost_saved: *self.cost_saved.lock(),
        }
    }
}

impl EventSink for AnalyticsRollup {
    fn emit(&self, event: AnalyticsEvent) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.counts.lock().entry(event.name.clone()).or_insert(0) += 1;

        match event.name.as_str() {
            EV_CACHE_HIT | EV_SEMANTIC_CACHE_HIT => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                if let Some(tokens) = event.payload.get("saved_tokens").and_then(|v| v.as_u64()) {
                    self.tokens_saved.fetch_add(tokens, Ordering::Relaxed);
                }
                if let Some(cost) = event.payload.get("saved_cost").and_then(|v| v.as_f64()) {
                    *self.cost_saved.lock() += cost;
                }
            }
            EV_API_CALL => {
                self.api_calls.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}
