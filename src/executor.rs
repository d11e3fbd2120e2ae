//! Per-request execution: routing, cache probes, the provider call with
//! retry and timeout, write-back, and savings accounting.
//!
//! The executor consumes one request and produces exactly one response.
//! It never returns `Err` to the dispatcher: every outcome, including
//! retry exhaustion and deadline expiry, is a `CompletionResponse`
//! (possibly with `success = false`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::cache::{exact_key, ExactCache, SemanticCache};
use crate::config::McpConfigManager;
use crate::embedding::Embedder;
use crate::events::{
    AnalyticsEvent, EventCategory, EventSink, EV_API_CALL, EV_CACHE_HIT, EV_PARSING_ERROR,
    EV_RATE_LIMITED, EV_REQUEST_FAILED, EV_REQUEST_TIMEOUT, EV_SEMANTIC_CACHE_HIT,
    EV_SEMANTIC_CACHE_MISS, EV_SMART_ROUTING, EV_STORE_IN_CACHE,
};
use crate::gateway::{NormalizedRequest, ProviderGateway};
use crate::router::RouteQuery;
use crate::types::{CompletionRequest, CompletionResponse, McpParams, Provider, Savings};
use crate::{telemetry, MuninnError};

/// Retry and timeout knobs.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum retries after the initial provider call. Default: 3.
    pub max_retries: u32,
    /// Base backoff; attempt `n` waits `retry_delay * 2^n`. Default: 1s.
    pub retry_delay: Duration,
    /// Total submit-to-response budget per request. Default: 30s.
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Executes one request end to end.
pub struct Executor {
    config_manager: Arc<McpConfigManager>,
    exact_cache: Arc<ExactCache>,
    semantic_cache: Arc<SemanticCache>,
    embedder: Arc<dyn Embedder>,
    gateway: Arc<dyn ProviderGateway>,
    sink: Arc<dyn EventSink>,
    config: ExecutorConfig,
}

impl Executor {
    pub(crate) fn new(
        config_manager: Arc<McpConfigManager>,
        exact_cache: Arc<ExactCache>,
        semantic_cache: Arc<SemanticCache>,
        embedder: Arc<dyn Embedder>,
        gateway: Arc<dyn ProviderGateway>,
        sink: Arc<dyn EventSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            config_manager,
            exact_cache,
            semantic_cache,
            embedder,
            gateway,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one request. `submitted_at` anchors processing time and the
    /// deadline; the deadline bounds the whole span including retries.
    pub(crate) async fn execute(
        &self,
        request: &CompletionRequest,
        submitted_at: Instant,
        deadline: Instant,
    ) -> CompletionResponse {
        let params = self.config_manager.effective_params(request);
        let settings = self.config_manager.settings();
        let router = self.config_manager.router();

        // 1. Route if the caller did not pin a model.
        let model = match &request.model {
            Some(model) => model.clone(),
            None if settings.smart_routing_enabled => {
                let decision =
                    router.select_scored(&RouteQuery::from_request(request, &params));
                metrics::counter!(telemetry::ROUTING_DECISIONS_TOTAL,
                    "model" => decision.model.clone()
                )
                .increment(1);
                self.sink.emit(
                    AnalyticsEvent::new(EventCategory::Mcp, EV_SMART_ROUTING)
                        .with_model(&decision.model)
                        .with_payload(serde_json::json!({
                            "score": decision.score,
                            "fallback": decision.fallback,
                        })),
                );
                decision.model
            }
            None => router.default_model().to_string(),
        };

        // 2. Exact probe.
        let key = exact_key(
            &model,
            request.temperature,
            request.system_prompt.as_deref(),
            &request.prompt,
        );
        if params.cache_strategy.uses_exact() {
            if let Some(cached) = self.exact_cache.get(key) {
                return self.cache_hit(&cached, None, "exact", EV_CACHE_HIT, submitted_at);
            }
        }

        // 3. Semantic probe. The embedding is kept for write-back.
        let mut query_embedding: Option<Vec<f32>> = None;
        if params.cache_strategy.uses_semantic() && settings.semantic_cache_enabled {
            match self.embedder.embed(&request.prompt).await {
                Ok(embedding) => {
                    let hit = self.semantic_cache.find_similar(
                        &embedding,
                        Some(&model),
                        params.min_similarity,
                    );
                    query_embedding = Some(embedding);
                    match hit {
                        Some(hit) => {
                            return self.cache_hit(
                                &hit.response,
                                Some(hit.similarity),
                                "semantic",
                                EV_SEMANTIC_CACHE_HIT,
                                submitted_at,
                            );
                        }
                        None => {
                            self.sink.emit(
                                AnalyticsEvent::new(EventCategory::Mcp, EV_SEMANTIC_CACHE_MISS)
                                    .with_model(&model),
                            );
                        }
                    }
                }
                Err(e) => {
                    // Embedding trouble downgrades to a miss; the provider
                    // path still works.
                    warn!(error = %e, "query embedding failed, skipping semantic probe");
                }
            }
        }

        // 4. Provider call with bounded retry inside the deadline.
        let provider = router
            .provider_of(&model)
            .or(params.preferred_provider)
            .unwrap_or(Provider::Claude);
        let reply = match self
            .call_provider(&model, provider, request, submitted_at, deadline)
            .await
        {
            Ok(reply) => reply,
            Err(response) => return *response,
        };

        let mut response = CompletionResponse::completed(
            reply.text,
            model.clone(),
            provider,
            reply.usage,
            submitted_at.elapsed(),
        );

        // 5. Parse. Failure keeps the raw text and is not retried.
        if let Some(parser) = &request.parser {
            match parser(&response.text) {
                Ok(parsed) => response.parsed = Some(parsed),
                Err(message) => {
                    self.sink.emit(
                        AnalyticsEvent::new(EventCategory::Error, EV_PARSING_ERROR)
                            .with_model(&model)
                            .with_payload(serde_json::json!({"message": message})),
                    );
                    let err = MuninnError::Parse(message);
                    response.success = false;
                    response.error = Some(crate::types::ResponseError {
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    return response;
                }
            }
        }

        // 6. Write back.
        if params.store_result {
            self.store(&response, request, &params, key, query_embedding, &model)
                .await;
        }

        response
    }

    /// Provider call with exponential backoff. Returns the terminal
    /// failure response in `Err` so `execute` can stay linear.
    async fn call_provider(
        &self,
        model: &str,
        provider: Provider,
        request: &CompletionRequest,
        submitted_at: Instant,
        deadline: Instant,
    ) -> Result<crate::gateway::NormalizedResponse, Box<CompletionResponse>> {
        let normalized = NormalizedRequest::from_prompt(
            model,
            &request.prompt,
            request.system_prompt.as_deref(),
            request.temperature,
            request.max_tokens,
        );

        let mut attempt: u32 = 0;
        loop {
            if Instant::now() >= deadline {
                return Err(Box::new(self.timeout_response(model, submitted_at)));
            }

            let started = Instant::now();
            let outcome = timeout_at(deadline.into(), self.gateway.complete(provider, &normalized))
                .await;

            match outcome {
                Err(_) => {
                    return Err(Box::new(self.timeout_response(model, submitted_at)));
                }
                Ok(Ok(reply)) => {
                    metrics::counter!(telemetry::REQUESTS_TOTAL,
                        "provider" => provider.as_str(), "status" => "ok"
                    )
                    .increment(1);
                    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
                        "provider" => provider.as_str()
                    )
                    .record(submitted_at.elapsed().as_secs_f64());
                    self.sink.emit(
                        AnalyticsEvent::new(EventCategory::Request, EV_API_CALL)
                            .with_model(model)
                            .with_payload(serde_json::json!({
                                "provider": provider.as_str(),
                                "prompt_tokens": reply.usage.prompt_tokens,
                                "completion_tokens": reply.usage.completion_tokens,
                                "duration_ms": started.elapsed().as_millis() as u64,
                                "attempts": attempt + 1,
                            })),
                    );
                    return Ok(reply);
                }
                Ok(Err(e)) => {
                    if matches!(e, MuninnError::RateLimited { .. }) {
                        self.sink.emit(
                            AnalyticsEvent::new(EventCategory::Error, EV_RATE_LIMITED)
                                .with_model(model)
                                .with_payload(serde_json::json!({"attempt": attempt + 1})),
                        );
                    }
                    if e.is_transient() && attempt < self.config.max_retries {
                        let backoff = self
                            .config
                            .retry_delay
                            .saturating_mul(2u32.saturating_pow(attempt));
                        let delay = e.retry_after().unwrap_or(backoff);
                        metrics::counter!(telemetry::RETRIES_TOTAL,
                            "provider" => provider.as_str()
                        )
                        .increment(1);
                        debug!(
                            model,
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after transient provider error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(Box::new(self.failure_response(e, model, submitted_at)));
                }
            }
        }
    }

    /// Build a hit response from a cached entry, with savings accounting.
    fn cache_hit(
        &self,
        cached: &CompletionResponse,
        similarity: Option<f32>,
        tier: &'static str,
        event: &'static str,
        submitted_at: Instant,
    ) -> CompletionResponse {
        let router = self.config_manager.router();
        let tokens = cached
            .usage
            .map(|u| u.total_tokens)
            .filter(|&t| t > 0)
            .unwrap_or(500);
        let cost = router.estimate_cost(
            &cached.model,
            f64::from(tokens) * 0.7,
            f64::from(tokens) * 0.3,
        );
        // Time is measured from dispatch: the hit's trivial cost.
        let time = submitted_at.elapsed();

        metrics::counter!(telemetry::TOKENS_SAVED_TOTAL).increment(u64::from(tokens));
        self.sink.emit(
            AnalyticsEvent::new(EventCategory::Mcp, event)
                .with_model(&cached.model)
                .with_payload(serde_json::json!({
                    "tier": tier,
                    "saved_tokens": tokens,
                    "saved_cost": cost,
                    "saved_time_ms": time.as_millis() as u64,
                })),
        );

        let mut response = cached.clone();
        response.from_cache = true;
        response.similarity = similarity;
        response.processing_time = submitted_at.elapsed();
        response.savings = Some(Savings { tokens, cost, time });
        response
    }

    /// Write a successful completion to the configured cache tiers.
    async fn store(
        &self,
        response: &CompletionResponse,
        request: &CompletionRequest,
        params: &McpParams,
        key: u64,
        query_embedding: Option<Vec<f32>>,
        model: &str,
    ) {
        let stored = Arc::new(response.clone());
        let mut tiers: Vec<&str> = Vec::with_capacity(2);

        if params.cache_strategy.uses_exact() {
            self.exact_cache.set(key, Arc::clone(&stored), params.cache_ttl);
            tiers.push("exact");
        }

        if params.cache_strategy.uses_semantic()
            && self.config_manager.settings().semantic_cache_enabled
        {
            let embedding = match query_embedding {
                Some(embedding) => Some(embedding),
                None => match self.embedder.embed(&request.prompt).await {
                    Ok(embedding) => Some(embedding),
                    Err(e) => {
                        warn!(error = %e, "embedding failed, skipping semantic store");
                        None
                    }
                },
            };
            if let Some(embedding) = embedding {
                self.semantic_cache.insert(
                    embedding,
                    request.prompt.clone(),
                    request.system_prompt.clone(),
                    Some(model.to_string()),
                    stored,
                    params.cache_ttl,
                );
                tiers.push("semantic");
            }
        }

        if !tiers.is_empty() {
            self.sink.emit(
                AnalyticsEvent::new(EventCategory::Mcp, EV_STORE_IN_CACHE)
                    .with_model(model)
                    .with_payload(serde_json::json!({"tiers": tiers})),
            );
        }
    }

    /// Terminal response for an entry whose deadline passed before
    /// dispatch. Used by the dispatcher; no provider is contacted.
    pub(crate) fn expired_response(&self, model: &str, submitted_at: Instant) -> CompletionResponse {
        self.timeout_response(model, submitted_at)
    }

    fn timeout_response(&self, model: &str, submitted_at: Instant) -> CompletionResponse {
        let elapsed = submitted_at.elapsed();
        let err = MuninnError::Timeout { elapsed };
        metrics::counter!(telemetry::FAILURES_TOTAL, "kind" => err.kind().to_string())
            .increment(1);
        self.sink.emit(
            AnalyticsEvent::new(EventCategory::Error, EV_REQUEST_TIMEOUT)
                .with_model(model)
                .with_payload(serde_json::json!({"elapsed_ms": elapsed.as_millis() as u64})),
        );
        CompletionResponse::failed(&err, model, elapsed)
    }

    fn failure_response(
        &self,
        error: MuninnError,
        model: &str,
        submitted_at: Instant,
    ) -> CompletionResponse {
        metrics::counter!(telemetry::FAILURES_TOTAL, "kind" => error.kind().to_string())
            .increment(1);
        metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => "error").increment(1);
        self.sink.emit(
            AnalyticsEvent::new(EventCategory::Error, EV_REQUEST_FAILED)
                .with_model(model)
                .with_payload(serde_json::json!({
                    "kind": error.kind().to_string(),
                    "message": error.to_string(),
                })),
        );
        CompletionResponse::failed(&error, model, submitted_at.elapsed())
    }
}
