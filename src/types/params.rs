//! Cache/routing parameters and strategy presets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Provider;
use crate::{MuninnError, Result};

/// Which cache tiers a request consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Canonical-hash lookup only.
    Exact,
    /// Embedding-similarity lookup only.
    Semantic,
    /// Exact probe first, semantic on miss.
    Hybrid,
}

impl CacheStrategy {
    pub fn uses_exact(&self) -> bool {
        matches!(self, CacheStrategy::Exact | CacheStrategy::Hybrid)
    }

    pub fn uses_semantic(&self) -> bool {
        matches!(self, CacheStrategy::Semantic | CacheStrategy::Hybrid)
    }
}

/// What the router optimizes for when it picks a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Speed,
    Quality,
    Cost,
}

impl TaskPriority {
    /// Weight vector over (speed, quality, cost) scores.
    pub fn weights(&self) -> (f64, f64, f64) {
        match self {
            TaskPriority::Speed => (0.6, 0.3, 0.1),
            TaskPriority::Quality => (0.1, 0.8, 0.1),
            TaskPriority::Cost => (0.2, 0.2, 0.6),
        }
    }
}

/// Per-request cache and routing parameters. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpParams {
    pub cache_strategy: CacheStrategy,
    /// Cosine-similarity floor for semantic hits, in [0, 1].
    pub min_similarity: f32,
    /// Time-to-live for entries this request stores.
    pub cache_ttl: Duration,
    pub priority: TaskPriority,
    /// Whether a successful completion is written back to the cache.
    pub store_result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<Provider>,
}

impl Default for McpParams {
    fn default() -> Self {
        StrategyPreset::Balanced.params()
    }
}

impl McpParams {
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = strategy;
        self
    }

    pub fn min_similarity(mut self, floor: f32) -> Self {
        self.min_similarity = floor;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn store_result(mut self, store: bool) -> Self {
        self.store_result = store;
        self
    }

    pub fn preferred_provider(mut self, provider: Option<Provider>) -> Self {
        self.preferred_provider = provider;
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(MuninnError::InvalidRequest(format!(
                "min_similarity must be in [0, 1], got {}",
                self.min_similarity
            )));
        }
        if self.cache_ttl.is_zero() {
            return Err(MuninnError::InvalidRequest(
                "cache_ttl must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Named bundle of default [`McpParams`].
///
/// The preset ordering is contractual: `minSimilarity` strictly increases
/// aggressive < balanced < conservative, and conservative is exact-only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreset {
    Aggressive,
    Balanced,
    Conservative,
}

impl StrategyPreset {
    /// Parse a preset name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Some(StrategyPreset::Aggressive),
            "balanced" => Some(StrategyPreset::Balanced),
            "conservative" => Some(StrategyPreset::Conservative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyPreset::Aggressive => "aggressive",
            StrategyPreset::Balanced => "balanced",
            StrategyPreset::Conservative => "conservative",
        }
    }

    /// The default parameters this preset expands to.
    pub fn params(&self) -> McpParams {
        match self {
            StrategyPreset::Aggressive => McpParams {
                cache_strategy: CacheStrategy::Hybrid,
                min_similarity: 0.65,
                cache_ttl: Duration::from_secs(24 * 60 * 60),
                priority: TaskPriority::Speed,
                store_result: true,
                preferred_provider: None,
            },
            StrategyPreset::Balanced => McpParams {
                cache_strategy: CacheStrategy::Semantic,
                min_similarity: 0.80,
                cache_ttl: Duration::from_secs(12 * 60 * 60),
                priority: TaskPriority::Quality,
                store_result: true,
                preferred_provider: None,
            },
            StrategyPreset::Conservative => McpParams {
                cache_strategy: CacheStrategy::Exact,
                min_similarity: 0.95,
                cache_ttl: Duration::from_secs(60 * 60),
                priority: TaskPriority::Quality,
                store_result: true,
                preferred_provider: None,
            },
        }
    }
}
