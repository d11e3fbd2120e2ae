//! Muninn - client-side optimization layer for LLM completions
//!
//! This crate sits between an application and one or more remote LLM
//! providers and minimizes latency, token spend, and redundant work when
//! the application issues many similar completion requests. It combines
//! a prioritized request pipeline, a two-tier response cache (exact and
//! semantic), a smart model router, and a bounded retry/timeout
//! executor behind a single `submit` call.
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{CompletionRequest, Muninn, RequestPriority};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let pipeline = Muninn::builder()
//!         .claude("sk-ant-your-key")
//!         .openai("sk-your-key")
//!         .build()?;
//!
//!     let response = pipeline
//!         .submit(
//!             CompletionRequest::new("Summarize the design constraints.")
//!                 .with_system_prompt("You are a terse reviewer.")
//!                 .with_priority(RequestPriority::High),
//!         )
//!         .await;
//!
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```
//!
//! # Picking a caching strategy
//!
//! ```rust,no_run
//! use muninn::{Muninn, StrategyPreset};
//!
//! # fn main() -> muninn::Result<()> {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # let _guard = rt.enter();
//! let pipeline = Muninn::builder().claude("sk-ant-your-key").build()?;
//!
//! // Hybrid caching with a permissive similarity floor:
//! pipeline.set_strategy(StrategyPreset::Aggressive);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod pipeline;
mod queue;
pub mod router;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use builder::{Muninn, MuninnBuilder};
pub use error::{ErrorKind, MuninnError, Result};
pub use pipeline::{PendingResponse, Pipeline, PipelineConfig, PipelineStats};

// Re-export the collaborator surfaces
pub use cache::{ExactCacheStats, FileStore, MemoryStore, PersistentStore, SemanticCacheStats};
pub use config::{McpConfigManager, McpParamsPatch, McpSettings};
pub use embedding::{Embedder, HashedBowEmbedder};
pub use events::{
    AnalyticsEvent, AnalyticsRollup, EventCategory, EventSink, MemorySink, NullSink, RollupSummary,
};
pub use executor::ExecutorConfig;
pub use gateway::{
    HttpGateway, MessageRole, NormalizedMessage, NormalizedRequest, NormalizedResponse,
    ProviderGateway,
};
pub use queue::QueueStats;
pub use router::{RouteDecision, RouteQuery, SmartRouter};

// Re-export all types
pub use types::{
    CacheStrategy, Capability, CapabilityScores, CompletionRequest, CompletionResponse,
    ComplexityLevel, McpParams, MetadataPatch, ModelMetadata, Provider, RequestMetadata,
    RequestPriority, ResponseError, ResponseParser, Savings, StrategyPreset, TaskPriority,
    TaskType, Usage,
};
