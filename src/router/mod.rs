//! Smart model router.
//!
//! Owns the model metadata table and picks one model per request by
//! maximizing a weighted blend of quality, speed, and cost scores. The
//! table is read-mostly; overrides take the writer lock and are atomic
//! from the selector's point of view.

pub mod catalog;

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::types::{
    Capability, CompletionRequest, ComplexityLevel, McpParams, MetadataPatch, ModelMetadata,
    Provider, TaskPriority, TaskType,
};
use crate::{MuninnError, Result};

pub use catalog::DEFAULT_MODEL;

/// Inputs to one routing decision, extracted from a request.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub task_type: TaskType,
    pub complexity: ComplexityLevel,
    pub required_capabilities: Vec<Capability>,
    pub preferred_provider: Option<Provider>,
    pub priority: TaskPriority,
    /// Estimated prompt tokens, for the cost score.
    pub prompt_tokens: u32,
    /// Estimated completion tokens, for the cost score.
    pub output_tokens: u32,
}

impl RouteQuery {
    /// Build a query from a request's metadata and its resolved MCP
    /// params.
    ///
    /// Token estimates fall back to a chars/4 heuristic for the prompt
    /// and a flat 300 for the completion when the caller supplied none.
    pub fn from_request(request: &CompletionRequest, params: &McpParams) -> Self {
        let prompt_tokens = request
            .metadata
            .prompt_tokens
            .unwrap_or_else(|| (request.prompt.len() as u32 / 4).max(1));
        let output_tokens = request.metadata.expected_output_tokens.unwrap_or(300);

        Self {
            task_type: request.metadata.task_type.unwrap_or_default(),
            complexity: request.metadata.complexity.unwrap_or_default(),
            required_capabilities: request.metadata.required_capabilities(),
            preferred_provider: params.preferred_provider,
            priority: params.priority,
            prompt_tokens,
            output_tokens,
        }
    }
}

/// One scored candidate, returned by [`SmartRouter::select_scored`].
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub model: String,
    pub score: f64,
    /// True when no candidate survived filtering and the configured
    /// default was returned instead.
    pub fallback: bool,
}

/// Capability-weighted model selector.
pub struct SmartRouter {
    models: RwLock<BTreeMap<String, ModelMetadata>>,
    default_model: String,
}

impl SmartRouter {
    /// Router over the built-in catalog.
    pub fn new() -> Self {
        Self::with_models(catalog::builtin_models(), DEFAULT_MODEL)
    }

    /// Router over a caller-supplied table.
    pub fn with_models(
        models: BTreeMap<String, ModelMetadata>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            models: RwLock::new(models),
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Whether the table knows this model.
    pub fn known(&self, model: &str) -> bool {
        self.models.read().contains_key(model)
    }

    /// Register or replace a model entry.
    pub fn register(&self, model: impl Into<String>, metadata: ModelMetadata) {
        self.models.write().insert(model.into(), metadata);
    }

    /// Apply a partial metadata override atomically.
    pub fn override_metadata(&self, model: &str, patch: &MetadataPatch) -> Result<()> {
        let mut models = self.models.write();
        let entry = models
            .get_mut(model)
            .ok_or_else(|| MuninnError::ModelNotFound(model.to_string()))?;
        entry.apply(patch);
        Ok(())
    }

    pub fn metadata(&self, model: &str) -> Option<ModelMetadata> {
        self.models.read().get(model).cloned()
    }

    pub fn provider_of(&self, model: &str) -> Option<Provider> {
        self.models.read().get(model).map(|m| m.provider)
    }

    /// Estimated dollar cost of a completion on `model`.
    ///
    /// Unknown models estimate to zero.
    pub fn estimate_cost(&self, model: &str, input_tokens: f64, output_tokens: f64) -> f64 {
        self.models.read().get(model).map_or(0.0, |m| {
            input_tokens * m.cost_per_input_token + output_tokens * m.cost_per_output_token
        })
    }

    /// Pick the best model for a query.
    pub fn select(&self, query: &RouteQuery) -> String {
        self.select_scored(query).model
    }

    /// Pick the best model, returning the winning score and whether the
    /// default fallback was used.
    ///
    /// Candidates on a non-preferred provider are skipped; candidates
    /// failing the capability gate score zero and are never chosen. Ties
    /// resolve to the lexicographically smaller model id (the table is a
    /// `BTreeMap`, and only a strictly greater score displaces the
    /// incumbent).
    pub fn select_scored(&self, query: &RouteQuery) -> RouteDecision {
        let models = self.models.read();
        let mut best: Option<(&str, f64)> = None;

        for (id, meta) in models.iter() {
            if let Some(preferred) = query.preferred_provider {
                if meta.provider != preferred {
                    continue;
                }
            }
            let Some(score) = score_model(meta, query) else {
                continue;
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((id, score));
            }
        }

        match best {
            Some((id, score)) => {
                debug!(model = id, score, "routing decision");
                RouteDecision {
                    model: id.to_string(),
                    score,
                    fallback: false,
                }
            }
            None => {
                debug!(model = %self.default_model, "no eligible model, using default");
                RouteDecision {
                    model: self.default_model.clone(),
                    score: 0.0,
                    fallback: true,
                }
            }
        }
    }
}

impl Default for SmartRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Score one candidate, or `None` when the capability gate rejects it.
fn score_model(meta: &ModelMetadata, query: &RouteQuery) -> Option<f64> {
    let threshold = catalog::gate_threshold(query.complexity);
    for capability in &query.required_capabilities {
        if meta.capabilities.score(*capability) < threshold {
            return None;
        }
    }

    let quality = quality_score(meta, query.task_type, query.complexity);
    let speed = speed_score(meta);
    let cost = cost_score(meta, query.prompt_tokens, query.output_tokens);

    let (w_speed, w_quality, w_cost) = query.priority.weights();
    Some(quality * w_quality + speed * w_speed + cost * w_cost)
}

/// Task-weighted capability average times the complexity multiplier.
fn quality_score(meta: &ModelMetadata, task: TaskType, complexity: ComplexityLevel) -> f64 {
    let weighted: f64 = catalog::task_weights(task)
        .iter()
        .map(|(capability, weight)| meta.capabilities.score(*capability) * weight)
        .sum();
    weighted * catalog::complexity_multiplier(complexity)
}

/// `10 − avg_ms / 500`, clamped to \[0, 10\].
fn speed_score(meta: &ModelMetadata) -> f64 {
    (10.0 - meta.average_response_time_ms as f64 / 500.0).clamp(0.0, 10.0)
}

/// `10 − min(cost, $0.10) / $0.10 × 10`: free scores 10, ten cents or
/// more scores 0.
fn cost_score(meta: &ModelMetadata, prompt_tokens: u32, output_tokens: u32) -> f64 {
    let estimated = prompt_tokens as f64 * meta.cost_per_input_token
        + output_tokens as f64 * meta.cost_per_output_token;
    10.0 - estimated.min(0.10) / 0.10 * 10.0
}
