//! Built-in model metadata and task weight tables.
//!
//! The catalog is a starting point, not a source of truth: costs and
//! latencies drift, and deployments override entries via
//! [`SmartRouter::override_metadata`](super::SmartRouter::override_metadata)
//! or replace the table wholesale at construction.

use std::collections::BTreeMap;

use crate::types::{Capability, CapabilityScores, ComplexityLevel, ModelMetadata, Provider, TaskType};

/// Model the router falls back to when no candidate survives filtering.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Build the built-in model table.
pub fn builtin_models() -> BTreeMap<String, ModelMetadata> {
    let mut models = BTreeMap::new();

    models.insert(
        "claude-3-5-haiku-20241022".to_string(),
        ModelMetadata::new(Provider::Claude)
            .with_context_size(200_000)
            .with_costs(0.8e-6, 4.0e-6)
            .with_latency_ms(1_200)
            .with_capabilities(CapabilityScores {
                reasoning: 6.0,
                creativity: 6.5,
                code_generation: 6.5,
                math_precision: 5.5,
                factual_accuracy: 7.0,
                context_understanding: 7.5,
            }),
    );

    models.insert(
        DEFAULT_MODEL.to_string(),
        ModelMetadata::new(Provider::Claude)
            .with_context_size(200_000)
            .with_costs(3.0e-6, 15.0e-6)
            .with_latency_ms(2_500)
            .with_capabilities(CapabilityScores {
                reasoning: 8.5,
                creativity: 8.0,
                code_generation: 9.0,
                math_precision: 8.0,
                factual_accuracy: 8.5,
                context_understanding: 9.0,
            }),
    );

    models.insert(
        "claude-3-opus-20240229".to_string(),
        ModelMetadata::new(Provider::Claude)
            .with_context_size(200_000)
            .with_costs(15.0e-6, 75.0e-6)
            .with_latency_ms(4_000)
            .with_capabilities(CapabilityScores {
                reasoning: 9.5,
                creativity: 9.0,
                code_generation: 8.5,
                math_precision: 8.5,
                factual_accuracy: 9.0,
                context_understanding: 9.5,
            }),
    );

    models.insert(
        "gpt-4o-mini".to_string(),
        ModelMetadata::new(Provider::OpenAi)
            .with_context_size(128_000)
            .with_costs(0.15e-6, 0.6e-6)
            .with_latency_ms(1_000)
            .with_capabilities(CapabilityScores {
                reasoning: 5.5,
                creativity: 6.0,
                code_generation: 6.0,
                math_precision: 5.0,
                factual_accuracy: 6.5,
                context_understanding: 7.0,
            }),
    );

    models.insert(
        "gpt-4o".to_string(),
        ModelMetadata::new(Provider::OpenAi)
            .with_context_size(128_000)
            .with_costs(2.5e-6, 10.0e-6)
            .with_latency_ms(2_000)
            .with_capabilities(CapabilityScores {
                reasoning: 8.0,
                creativity: 7.5,
                code_generation: 8.5,
                math_precision: 7.5,
                factual_accuracy: 8.0,
                context_understanding: 8.5,
            }),
    );

    models.insert(
        "o1-mini".to_string(),
        ModelMetadata::new(Provider::OpenAi)
            .with_context_size(128_000)
            .with_costs(3.0e-6, 12.0e-6)
            .with_latency_ms(5_000)
            .with_capabilities(CapabilityScores {
                reasoning: 9.0,
                creativity: 6.0,
                code_generation: 8.0,
                math_precision: 9.0,
                factual_accuracy: 8.0,
                context_understanding: 8.0,
            }),
    );

    models
}

/// Capability weights per task type. Weights sum to 1.0 per row; the
/// `General` row is the mandatory fallback for unknown tasks.
pub fn task_weights(task: TaskType) -> &'static [(Capability, f64)] {
    use Capability::*;
    match task {
        TaskType::General => &[
            (Reasoning, 0.25),
            (Creativity, 0.15),
            (CodeGeneration, 0.10),
            (MathPrecision, 0.10),
            (FactualAccuracy, 0.20),
            (ContextUnderstanding, 0.20),
        ],
        TaskType::Code => &[
            (CodeGeneration, 0.40),
            (Reasoning, 0.25),
            (MathPrecision, 0.15),
            (ContextUnderstanding, 0.15),
            (FactualAccuracy, 0.05),
        ],
        TaskType::Creative => &[
            (Creativity, 0.45),
            (ContextUnderstanding, 0.25),
            (Reasoning, 0.15),
            (FactualAccuracy, 0.15),
        ],
        TaskType::Analysis => &[
            (Reasoning, 0.35),
            (ContextUnderstanding, 0.25),
            (FactualAccuracy, 0.25),
            (MathPrecision, 0.15),
        ],
        TaskType::Math => &[
            (MathPrecision, 0.45),
            (Reasoning, 0.30),
            (FactualAccuracy, 0.15),
            (ContextUnderstanding, 0.10),
        ],
        TaskType::Factual => &[
            (FactualAccuracy, 0.45),
            (Reasoning, 0.20),
            (ContextUnderstanding, 0.20),
            (MathPrecision, 0.15),
        ],
        TaskType::Cad => &[
            (MathPrecision, 0.30),
            (CodeGeneration, 0.25),
            (Reasoning, 0.25),
            (ContextUnderstanding, 0.20),
        ],
    }
}

/// Minimum capability score required at each complexity level. The same
/// threshold applies to every required capability; there is no
/// per-capability override.
pub fn gate_threshold(level: ComplexityLevel) -> f64 {
    match level {
        ComplexityLevel::Low => 3.0,
        ComplexityLevel::Medium => 6.0,
        ComplexityLevel::High => 8.0,
    }
}

/// Quality-score multiplier per complexity level.
pub fn complexity_multiplier(level: ComplexityLevel) -> f64 {
    match level {
        ComplexityLevel::Low => 0.7,
        ComplexityLevel::Medium => 1.0,
        ComplexityLevel::High => 1.3,
    }
}
