//! End-to-end pipeline tests: submission, priority scheduling, caching
//! round trips, backpressure, and shutdown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use muninn::{
    CacheStrategy, CompletionRequest, ErrorKind, McpParams, Muninn, MuninnError,
    NormalizedRequest, NormalizedResponse, Pipeline, Provider, ProviderGateway, RequestPriority,
    Result, StrategyPreset, Usage,
};

/// Gateway double that records prompts and can block until released.
struct ScriptedGateway {
    calls: Mutex<Vec<String>>,
    total_calls: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            total_calls: AtomicU32::new(0),
            gate: None,
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn complete(
        &self,
        _provider: Provider,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let prompt = request
            .messages
            .iter()
            .rev()
            .map(|m| m.content.clone())
            .next()
            .unwrap_or_default();
        let is_plug = prompt == "plug";
        self.calls.lock().push(prompt);

        if is_plug {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        Ok(NormalizedResponse {
            text: "This is a test response".to_string(),
            usage: Usage::new(100, 50),
            model: request.model.clone(),
        })
    }
}

fn pipeline_with(gateway: Arc<ScriptedGateway>) -> Pipeline {
    Muninn::builder()
        .gateway(gateway)
        .dispatcher_parallelism(1)
        .build()
        .expect("pipeline builds")
}

fn exact_request(prompt: &str) -> CompletionRequest {
    CompletionRequest::new(prompt)
        .with_model("claude-3-7-sonnet-20250219")
        .with_temperature(0.5)
        .with_mcp(
            McpParams::default()
                .cache_strategy(CacheStrategy::Exact)
                .store_result(true),
        )
}

// ============================================================================
// Exact cache round trip
// ============================================================================

#[tokio::test]
async fn exact_cache_round_trip() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let first = pipeline.submit(exact_request("Test prompt")).await;
    assert!(first.success);
    assert_eq!(first.text, "This is a test response");
    assert!(!first.from_cache);
    assert_eq!(first.provider, Some(Provider::Claude));
    assert_eq!(first.usage.unwrap().total_tokens, 150);

    let second = pipeline.submit(exact_request("Test prompt")).await;
    assert!(second.success);
    assert_eq!(second.text, first.text);
    assert!(second.from_cache);
    assert_eq!(second.savings.expect("savings populated").tokens, 150);

    // The provider was only contacted once.
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn cache_hit_savings_time_is_the_hits_own_cost() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));

    pipeline.submit(exact_request("Test prompt")).await;

    let started = Instant::now();
    let hit = pipeline.submit(exact_request("Test prompt")).await;
    let wall = started.elapsed();

    assert!(hit.from_cache);
    let savings = hit.savings.expect("savings populated");
    // Time is measured from dispatch and bounded by the wall clock of
    // serving the hit, not the catalog latency of the cached model
    // (2.5s for this one).
    assert!(savings.time <= hit.processing_time);
    assert!(hit.processing_time <= wall);
    assert!(
        savings.time < Duration::from_millis(2500),
        "savings time {:?} looks like a per-model constant",
        savings.time
    );
}

#[tokio::test]
async fn different_prompts_do_not_share_cache_entries() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));

    pipeline.submit(exact_request("prompt one")).await;
    pipeline.submit(exact_request("prompt two")).await;

    assert_eq!(gateway.call_count(), 2);
}

// ============================================================================
// Priority scheduling
// ============================================================================

#[tokio::test]
async fn high_priority_dispatches_before_earlier_low() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = pipeline_with(Arc::clone(&gateway));

    // Occupy the single worker so the next submissions queue up.
    let plug = pipeline.submit(
        CompletionRequest::new("plug").with_mcp(McpParams::default().store_result(false)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let low = pipeline.submit(
        CompletionRequest::new("Low")
            .with_priority(RequestPriority::Low)
            .with_mcp(McpParams::default().store_result(false)),
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
    let high = pipeline.submit(
        CompletionRequest::new("High")
            .with_priority(RequestPriority::High)
            .with_mcp(McpParams::default().store_result(false)),
    );

    gate.notify_one();
    let (_, _, _) = tokio::join!(plug, low, high);

    assert_eq!(gateway.prompts(), vec!["plug", "High", "Low"]);
}

#[tokio::test]
async fn fifo_within_priority_band() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let plug = pipeline.submit(
        CompletionRequest::new("plug").with_mcp(McpParams::default().store_result(false)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut pending = Vec::new();
    for name in ["first", "second", "third"] {
        pending.push(pipeline.submit(
            CompletionRequest::new(name)
                .with_priority(RequestPriority::Normal)
                .with_mcp(McpParams::default().store_result(false)),
        ));
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    gate.notify_one();
    plug.await;
    for p in pending {
        p.await;
    }

    assert_eq!(gateway.prompts(), vec!["plug", "first", "second", "third"]);
}

// ============================================================================
// Backpressure and rejection
// ============================================================================

#[tokio::test]
async fn queue_full_fails_submission_immediately() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = Muninn::builder()
        .gateway(Arc::clone(&gateway) as Arc<dyn ProviderGateway>)
        .dispatcher_parallelism(1)
        .queue_capacity(1)
        .build()
        .unwrap();

    let plug = pipeline.submit(CompletionRequest::new("plug"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Fills the single queue slot.
    let queued = pipeline.submit(CompletionRequest::new("queued"));
    // Overflows.
    let rejected = pipeline.submit(CompletionRequest::new("rejected")).await;

    assert!(!rejected.success);
    assert_eq!(rejected.error_kind(), Some(ErrorKind::QueueFull));

    gate.notify_one();
    let (_, queued) = tokio::join!(plug, queued);
    // The admitted request was never dropped.
    assert!(queued.success);
}

#[tokio::test]
async fn empty_prompt_rejected_at_submit() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let response = pipeline.submit(CompletionRequest::new("   ")).await;
    assert!(!response.success);
    assert_eq!(response.error_kind(), Some(ErrorKind::ConfigError));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn unknown_model_rejected_at_submit() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let response = pipeline
        .submit(CompletionRequest::new("hello").with_model("no-such-model"))
        .await;
    assert!(!response.success);
    assert_eq!(response.error_kind(), Some(ErrorKind::ConfigError));
}

// ============================================================================
// Priority inference
// ============================================================================

#[tokio::test]
async fn metadata_kind_infers_priority() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let plug = pipeline.submit(
        CompletionRequest::new("plug").with_mcp(McpParams::default().store_result(false)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut background = CompletionRequest::new("batch job");
    background.metadata.kind = Some("background_batch".into());
    let background = pipeline.submit(background);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut interactive = CompletionRequest::new("user message");
    interactive.metadata.kind = Some("interactive_message".into());
    let interactive = pipeline.submit(interactive);

    gate.notify_one();
    let (_, _, _) = tokio::join!(plug, background, interactive);

    assert_eq!(gateway.prompts(), vec!["plug", "user message", "batch job"]);
}

// ============================================================================
// Stats and shutdown
// ============================================================================

#[tokio::test]
async fn stats_snapshot_reflects_settings_and_caches() {
    let gateway = Arc::new(ScriptedGateway::new());
    let pipeline = pipeline_with(Arc::clone(&gateway));
    pipeline.set_strategy(StrategyPreset::Aggressive);

    pipeline.submit(exact_request("warm the cache")).await;

    let stats = pipeline.stats();
    assert_eq!(stats.settings.strategy, StrategyPreset::Aggressive);
    assert_eq!(stats.exact_cache.total_entries, 1);
    assert_eq!(stats.queue.total_enqueued, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn dropping_pipeline_resolves_queued_requests() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let plug = pipeline.submit(CompletionRequest::new("plug"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = pipeline.submit(CompletionRequest::new("never dispatched"));

    drop(pipeline);

    let response = queued.await;
    assert!(!response.success);
    assert_eq!(response.error_kind(), Some(ErrorKind::ConfigError));
    let response = plug.await;
    assert!(!response.success);
}

#[tokio::test]
async fn cancelled_request_is_skipped() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::gated(Arc::clone(&gate)));
    let pipeline = pipeline_with(Arc::clone(&gateway));

    let plug = pipeline.submit(
        CompletionRequest::new("plug").with_mcp(McpParams::default().store_result(false)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cancelled = pipeline.submit(
        CompletionRequest::new("cancelled").with_mcp(McpParams::default().store_result(false)),
    );
    drop(cancelled);
    let kept = pipeline.submit(
        CompletionRequest::new("kept").with_mcp(McpParams::default().store_result(false)),
    );

    gate.notify_one();
    let (_, kept) = tokio::join!(plug, kept);
    assert!(kept.success);
    assert_eq!(gateway.prompts(), vec!["plug", "kept"]);
}

// ============================================================================
// Deadline enforcement
// ============================================================================

/// Gateway that never responds.
struct StalledGateway;

#[async_trait]
impl ProviderGateway for StalledGateway {
    async fn complete(
        &self,
        _provider: Provider,
        _request: &NormalizedRequest,
    ) -> Result<NormalizedResponse> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(MuninnError::Http("unreachable".into()))
    }
}

#[tokio::test]
async fn deadline_bounds_the_whole_request() {
    let pipeline = Muninn::builder()
        .gateway(Arc::new(StalledGateway))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let started = Instant::now();
    let response = pipeline.submit(CompletionRequest::new("slow")).await;
    let elapsed = started.elapsed();

    assert!(!response.success);
    assert_eq!(response.error_kind(), Some(ErrorKind::Timeout));
    assert!(
        elapsed < Duration::from_millis(600),
        "timeout overshot: {elapsed:?}"
    );
}
