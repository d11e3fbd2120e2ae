//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider id (e.g. "claude", "openai")
//! - `model`: model id the request resolved to
//! - `tier`: cache tier: "exact" or "semantic"
//! - `kind`: error kind on failure counters

/// Total requests dispatched by the executor.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// End-to-end request duration in seconds, submit to response.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Total retry attempts (not counting the initial provider call).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "muninn_retries_total";

/// Total cache hits.
///
/// Labels: `tier` ("exact" | "semantic").
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier` ("exact" | "semantic").
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Tokens the cache tier claims to have saved.
pub const TOKENS_SAVED_TOTAL: &str = "muninn_tokens_saved_total";

/// Total requests that failed terminally.
///
/// Labels: `kind` (error kind).
pub const FAILURES_TOTAL: &str = "muninn_failures_total";

/// Total smart-routing decisions.
///
/// Labels: `model`.
pub const ROUTING_DECISIONS_TOTAL: &str = "muninn_routing_decisions_total";

/// Current queue depth, sampled on enqueue/dequeue.
pub const QUEUE_DEPTH: &str = "muninn_queue_depth";
