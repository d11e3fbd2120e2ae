//! Builder for wiring a pipeline instance.
//!
//! Every collaborator is injectable: the provider gateway, embedder,
//! persistent store, and event sink all have production defaults but
//! can be swapped for test doubles. Nothing here is process-global:
//! multiple pipelines with independent state are fine.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ExactCache, ExactCacheConfig, PersistentStore, SemanticCache, SemanticCacheConfig};
use crate::config::McpConfigManager;
use crate::embedding::{Embedder, HashedBowEmbedder};
use crate::events::{EventSink, NullSink};
use crate::executor::{Executor, ExecutorConfig};
use crate::gateway::{HttpGateway, ProviderGateway};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::router::SmartRouter;
use crate::types::ModelMetadata;
use crate::{MuninnError, Result};

/// Main entry point for creating pipeline instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring pipeline instances.
pub struct MuninnBuilder {
    claude_key: Option<String>,
    claude_base_url: Option<String>,
    openai_key: Option<String>,
    openai_base_url: Option<String>,
    gateway: Option<Arc<dyn ProviderGateway>>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn PersistentStore>>,
    sink: Option<Arc<dyn EventSink>>,
    models: Option<BTreeMap<String, ModelMetadata>>,
    default_model: Option<String>,
    executor: ExecutorConfig,
    pipeline: PipelineConfig,
    exact: ExactCacheConfig,
    semantic: SemanticCacheConfig,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            claude_key: None,
            claude_base_url: None,
            openai_key: None,
            openai_base_url: None,
            gateway: None,
            embedder: None,
            store: None,
            sink: None,
            models: None,
            default_model: None,
            executor: ExecutorConfig::default(),
            pipeline: PipelineConfig::default(),
            exact: ExactCacheConfig::default(),
            semantic: SemanticCacheConfig::default(),
        }
    }

    /// Configure the Claude provider.
    pub fn claude(mut self, api_key: impl Into<String>) -> Self {
        self.claude_key = Some(api_key.into());
        self
    }

    /// Override the Claude base URL (proxies, tests).
    pub fn claude_base_url(mut self, url: impl Into<String>) -> Self {
        self.claude_base_url = Some(url.into());
        self
    }

    /// Configure the OpenAI provider.
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai_key = Some(api_key.into());
        self
    }

    /// Override the OpenAI base URL (proxies, tests).
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Inject a gateway, replacing HTTP egress entirely.
    pub fn gateway(mut self, gateway: Arc<dyn ProviderGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Inject an embedder for the semantic cache. Defaults to the
    /// placeholder hashed bag-of-words embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Enable the exact cache's durable mirror.
    pub fn persistent_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an analytics sink. Defaults to dropping events.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the built-in model catalog.
    pub fn models(mut self, models: BTreeMap<String, ModelMetadata>) -> Self {
        self.models = Some(models);
        self
    }

    /// Set the fallback model returned when routing finds no candidate.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Maximum retries after the initial provider call.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.executor.max_retries = retries;
        self
    }

    /// Base retry backoff; attempt `n` waits `delay * 2^n`.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.executor.retry_delay = delay;
        self
    }

    /// Total submit-to-response budget per request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.executor.timeout = timeout;
        self
    }

    /// Queue capacity; submissions beyond it fail with `QueueFull`.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.queue_capacity = capacity;
        self
    }

    /// Number of dispatcher workers.
    pub fn dispatcher_parallelism(mut self, workers: usize) -> Self {
        self.pipeline.dispatcher_parallelism = workers;
        self
    }

    /// Interval between cache sweeper passes.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.pipeline.sweep_interval = interval;
        self
    }

    /// Exact-cache capacity before LRU eviction.
    pub fn exact_cache_entries(mut self, entries: usize) -> Self {
        self.exact.max_entries = entries;
        self
    }

    /// Namespace for the durable mirror blob.
    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.exact.namespace = namespace.into();
        self
    }

    /// Semantic-cache capacity before pressure eviction.
    pub fn semantic_cache_entries(mut self, entries: usize) -> Self {
        self.semantic.max_entries = entries;
        self
    }

    /// Embedding dimensionality for the default embedder.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.semantic.dimensions = dimensions;
        self
    }

    /// Build the pipeline and start its dispatcher workers.
    ///
    /// Requires a tokio runtime context. Fails when neither an API key
    /// nor an injected gateway provides egress.
    pub fn build(self) -> Result<Pipeline> {
        let gateway: Arc<dyn ProviderGateway> = match self.gateway {
            Some(gateway) => gateway,
            None => {
                if self.claude_key.is_none() && self.openai_key.is_none() {
                    return Err(MuninnError::Configuration(
                        "no provider configured: set an API key or inject a gateway".into(),
                    ));
                }
                let mut http = HttpGateway::new();
                if let Some(key) = self.claude_key {
                    http = http.claude(key);
                    if let Some(url) = self.claude_base_url {
                        http = http.claude_base_url(url);
                    }
                }
                if let Some(key) = self.openai_key {
                    http = http.openai(key);
                    if let Some(url) = self.openai_base_url {
                        http = http.openai_base_url(url);
                    }
                }
                Arc::new(http)
            }
        };

        let router = match self.models {
            Some(models) => {
                let default_model = self
                    .default_model
                    .unwrap_or_else(|| crate::router::DEFAULT_MODEL.to_string());
                SmartRouter::with_models(models, default_model)
            }
            None => match self.default_model {
                Some(default_model) => {
                    SmartRouter::with_models(crate::router::catalog::builtin_models(), default_model)
                }
                None => SmartRouter::new(),
            },
        };
        let config_manager = Arc::new(McpConfigManager::new(Arc::new(router)));

        // An injected embedder fixes the cache dimensionality; the
        // configured value only sizes the default placeholder.
        let (embedder, semantic_config) = match self.embedder {
            Some(embedder) => {
                let config = SemanticCacheConfig {
                    dimensions: embedder.dimensions(),
                    ..self.semantic
                };
                (embedder, config)
            }
            None => {
                let embedder: Arc<dyn Embedder> =
                    Arc::new(HashedBowEmbedder::new(self.semantic.dimensions));
                (embedder, self.semantic)
            }
        };

        let exact_cache = Arc::new(match self.store {
            Some(store) => ExactCache::with_store(self.exact, store),
            None => ExactCache::new(self.exact),
        });
        let semantic_cache = Arc::new(SemanticCache::new(semantic_config));
        let sink: Arc<dyn EventSink> = self.sink.unwrap_or_else(|| Arc::new(NullSink));

        let executor = Executor::new(
            Arc::clone(&config_manager),
            Arc::clone(&exact_cache),
            Arc::clone(&semantic_cache),
            embedder,
            gateway,
            sink,
            self.executor,
        );

        Ok(Pipeline::new(
            self.pipeline,
            executor,
            config_manager,
            exact_cache,
            semantic_cache,
        ))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
