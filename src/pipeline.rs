//! The request pipeline: single entry point, bounded priority queue,
//! and a cooperative pool of dispatcher workers.
//!
//! `submit` validates, assigns a sequence number, and enqueues; it
//! never blocks the caller beyond the enqueue step. Workers drain the
//! queue strictly by priority weight (FIFO within a band via sequence
//! numbers), check the deadline before touching the provider, and hand
//! each request to the executor. Every submission resolves to exactly
//! one [`CompletionResponse`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{ExactCache, ExactCacheStats, SemanticCache, SemanticCacheStats};
use crate::config::{McpConfigManager, McpParamsPatch, McpSettings};
use crate::executor::Executor;
use crate::queue::{QueueStats, QueuedRequest, RequestQueue};
use crate::router::SmartRouter;
use crate::types::{
    CompletionRequest, CompletionResponse, MetadataPatch, Provider, StrategyPreset,
};
use crate::{MuninnError, Result};

/// Pipeline-level knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Queue capacity; submissions beyond it fail with `QueueFull`.
    pub queue_capacity: usize,
    /// Number of dispatcher workers. Default: 4.
    pub dispatcher_parallelism: usize,
    /// Interval between cache sweeper passes. Default: 5 minutes.
    pub sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            dispatcher_parallelism: 4,
            sweep_interval: crate::cache::exact::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Future side of a submitted request.
///
/// Resolves to the request's single response. Dropping it cancels the
/// request: the dispatcher skips entries whose receiver is gone. If the
/// pipeline shuts down first, the future resolves to a terminal
/// `ConfigError` response.
pub struct PendingResponse {
    rx: oneshot::Receiver<CompletionResponse>,
    submitted_at: Instant,
}

impl Future for PendingResponse {
    type Output = CompletionResponse;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(response),
            Poll::Ready(Err(_)) => Poll::Ready(CompletionResponse::failed(
                &MuninnError::Shutdown,
                "",
                self.submitted_at.elapsed(),
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Snapshot returned by [`Pipeline::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub queue: QueueStats,
    pub in_flight: usize,
    pub exact_cache: ExactCacheStats,
    pub semantic_cache: SemanticCacheStats,
    pub settings: McpSettings,
}

/// The MCP pipeline. Construct via [`Muninn::builder`](crate::Muninn::builder).
pub struct Pipeline {
    queue: Arc<RequestQueue>,
    notify: Arc<Notify>,
    executor: Arc<Executor>,
    config_manager: Arc<McpConfigManager>,
    exact_cache: Arc<ExactCache>,
    semantic_cache: Arc<SemanticCache>,
    seq: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub(crate) fn new(
        config: PipelineConfig,
        executor: Executor,
        config_manager: Arc<McpConfigManager>,
        exact_cache: Arc<ExactCache>,
        semantic_cache: Arc<SemanticCache>,
    ) -> Self {
        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        let notify = Arc::new(Notify::new());
        let executor = Arc::new(executor);
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.dispatcher_parallelism.max(1))
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let notify = Arc::clone(&notify);
                let executor = Arc::clone(&executor);
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(async move {
                    debug!(worker, "dispatcher worker started");
                    worker_loop(queue, notify, executor, in_flight).await;
                })
            })
            .collect();

        exact_cache.start_sweeper(config.sweep_interval);
        let sweeper = {
            let semantic = Arc::downgrade(&semantic_cache);
            let period = config.sweep_interval;
            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    match semantic.upgrade() {
                        Some(cache) => {
                            cache.sweep();
                        }
                        None => break,
                    }
                }
            }))
        };

        Self {
            queue,
            notify,
            executor,
            config_manager,
            exact_cache,
            semantic_cache,
            seq: AtomicU64::new(0),
            in_flight,
            workers,
            sweeper,
        }
    }

    /// Submit a request.
    ///
    /// Returns immediately; the returned future resolves to the
    /// request's single response. Shape errors and queue backpressure
    /// resolve the future on first poll rather than erroring the call.
    pub fn submit(&self, request: CompletionRequest) -> PendingResponse {
        let submitted_at = Instant::now();
        let (tx, rx) = oneshot::channel();
        let pending = PendingResponse { rx, submitted_at };

        if let Err(e) = self.validate(&request) {
            let _ = tx.send(CompletionResponse::failed(
                &e,
                request.model.as_deref().unwrap_or(""),
                submitted_at.elapsed(),
            ));
            return pending;
        }

        let priority = request
            .priority
            .unwrap_or_else(|| self.config_manager.infer_priority(&request.metadata));
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let deadline = submitted_at + self.executor.config().timeout;

        let entry = QueuedRequest {
            seq,
            weight: priority.weight(),
            request,
            submitted_at,
            deadline,
            reply: tx,
        };

        match self.queue.push(entry) {
            Ok(()) => self.notify.notify_one(),
            Err(rejected) => {
                let err = MuninnError::QueueFull {
                    capacity: self.queue.capacity(),
                };
                let model = rejected.request.model.clone().unwrap_or_default();
                let _ = rejected.reply.send(CompletionResponse::failed(
                    &err,
                    model,
                    submitted_at.elapsed(),
                ));
            }
        }

        pending
    }

    fn validate(&self, request: &CompletionRequest) -> Result<()> {
        request.validate()?;
        if let Some(model) = &request.model {
            if !self.config_manager.router().known(model) {
                return Err(MuninnError::InvalidRequest(format!(
                    "unknown model: {model}"
                )));
            }
        }
        Ok(())
    }

    /// Queue depth, in-flight count, cache stats, and settings.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            queue: self.queue.stats(),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            exact_cache: self.exact_cache.stats(),
            semantic_cache: self.semantic_cache.stats(),
            settings: self.config_manager.settings(),
        }
    }

    pub fn config_manager(&self) -> &Arc<McpConfigManager> {
        &self.config_manager
    }

    pub fn router(&self) -> &Arc<SmartRouter> {
        self.config_manager.router()
    }

    // ------------------------------------------------------------------
    // Admin surface (delegates to the config manager)
    // ------------------------------------------------------------------

    pub fn set_strategy(&self, preset: StrategyPreset) {
        self.config_manager.set_strategy(preset);
    }

    pub fn update_strategy_config(&self, preset: StrategyPreset, patch: &McpParamsPatch) {
        self.config_manager.update_strategy_config(preset, patch);
    }

    pub fn set_multi_provider_enabled(&self, enabled: bool) {
        self.config_manager.set_multi_provider_enabled(enabled);
    }

    pub fn set_preferred_provider(&self, provider: Option<Provider>) {
        self.config_manager.set_preferred_provider(provider);
    }

    pub fn set_semantic_cache_enabled(&self, enabled: bool) {
        self.config_manager.set_semantic_cache_enabled(enabled);
    }

    pub fn set_smart_routing_enabled(&self, enabled: bool) {
        self.config_manager.set_smart_routing_enabled(enabled);
    }

    pub fn set_default_ttl(&self, ttl: Duration) {
        self.config_manager.set_default_ttl(ttl);
    }

    /// Partial model-metadata override on the router.
    pub fn override_model(&self, model: &str, patch: &MetadataPatch) -> Result<()> {
        self.config_manager.router().override_metadata(model, patch)
    }

    /// Drop both cache tiers.
    pub fn clear_caches(&self) {
        self.exact_cache.clear();
        self.semantic_cache.clear();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        // Queued entries drop their reply senders with the queue; their
        // futures resolve to a terminal shutdown response.
    }
}

async fn worker_loop(
    queue: Arc<RequestQueue>,
    notify: Arc<Notify>,
    executor: Arc<Executor>,
    in_flight: Arc<AtomicUsize>,
) {
    loop {
        let entry = loop {
            match queue.pop() {
                Some(entry) => break entry,
                None => notify.notified().await,
            }
        };

        // Caller dropped the future: cancelled, skip silently.
        if entry.reply.is_closed() {
            continue;
        }

        // Deadline already passed: fail without contacting the provider.
        if Instant::now() >= entry.deadline {
            queue.record_expired();
            let model = entry.request.model.clone().unwrap_or_default();
            let response = executor.expired_response(&model, entry.submitted_at);
            let _ = entry.reply.send(response);
            continue;
        }

        in_flight.fetch_add(1, Ordering::Relaxed);
        let response = executor
            .execute(&entry.request, entry.submitted_at, entry.deadline)
            .await;
        in_flight.fetch_sub(1, Ordering::Relaxed);
        let _ = entry.reply.send(response);
    }
}
