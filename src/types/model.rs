//! Model metadata, provider ids, and routing enums.

use serde::{Deserialize, Serialize};

/// Closed set of completion providers.
///
/// Stringly-typed provider ids are normalized to this enum at the
/// boundary; parsing is case-insensitive (`"CLAUDE"` and `"claude"` are
/// the same provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    OpenAi,
}

impl Provider {
    /// Parse a provider id, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Some(Provider::Claude),
            "openai" => Some(Provider::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability dimension a model is scored on (0..=10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Reasoning,
    Creativity,
    CodeGeneration,
    MathPrecision,
    FactualAccuracy,
    ContextUnderstanding,
}

impl Capability {
    /// All capability dimensions, in a stable order.
    pub const ALL: [Capability; 6] = [
        Capability::Reasoning,
        Capability::Creativity,
        Capability::CodeGeneration,
        Capability::MathPrecision,
        Capability::FactualAccuracy,
        Capability::ContextUnderstanding,
    ];
}

/// Per-model capability scores, each in 0..=10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityScores {
    pub reasoning: f64,
    pub creativity: f64,
    pub code_generation: f64,
    pub math_precision: f64,
    pub factual_accuracy: f64,
    pub context_understanding: f64,
}

impl CapabilityScores {
    /// Look up the score for a single capability.
    pub fn score(&self, capability: Capability) -> f64 {
        match capability {
            Capability::Reasoning => self.reasoning,
            Capability::Creativity => self.creativity,
            Capability::CodeGeneration => self.code_generation,
            Capability::MathPrecision => self.math_precision,
            Capability::FactualAccuracy => self.factual_accuracy,
            Capability::ContextUnderstanding => self.context_understanding,
        }
    }
}

/// Static metadata for one model, owned by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub provider: Provider,
    /// Maximum context window in tokens.
    pub context_size: u32,
    /// Cost per input token, in dollars.
    pub cost_per_input_token: f64,
    /// Cost per output token, in dollars.
    pub cost_per_output_token: f64,
    /// Typical end-to-end latency for a completion.
    pub average_response_time_ms: u64,
    pub capabilities: CapabilityScores,
}

impl ModelMetadata {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            context_size: 0,
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            average_response_time_ms: 0,
            capabilities: CapabilityScores::default(),
        }
    }

    pub fn with_context_size(mut self, tokens: u32) -> Self {
        self.context_size = tokens;
        self
    }

    /// Set per-token costs in dollars (input, output).
    pub fn with_costs(mut self, input: f64, output: f64) -> Self {
        self.cost_per_input_token = input;
        self.cost_per_output_token = output;
        self
    }

    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.average_response_time_ms = ms;
        self
    }

    pub fn with_capabilities(mut self, scores: CapabilityScores) -> Self {
        self.capabilities = scores;
        self
    }

    /// Apply a partial override. Unset patch fields leave the current
    /// value untouched.
    pub fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(provider) = patch.provider {
            self.provider = provider;
        }
        if let Some(context_size) = patch.context_size {
            self.context_size = context_size;
        }
        if let Some(cost) = patch.cost_per_input_token {
            self.cost_per_input_token = cost;
        }
        if let Some(cost) = patch.cost_per_output_token {
            self.cost_per_output_token = cost;
        }
        if let Some(ms) = patch.average_response_time_ms {
            self.average_response_time_ms = ms;
        }
        if let Some(capabilities) = patch.capabilities {
            self.capabilities = capabilities;
        }
    }
}

/// Partial [`ModelMetadata`] used by `SmartRouter::override_metadata`.
///
/// All fields are optional; only set fields overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_input_token: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_output_token: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityScores>,
}

/// Task category the router weights capability scores by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    General,
    Code,
    Creative,
    Analysis,
    Math,
    Factual,
    Cad,
}

impl TaskType {
    /// Parse a task type string; unknown strings fall back to `General`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "code" => TaskType::Code,
            "creative" => TaskType::Creative,
            "analysis" => TaskType::Analysis,
            "math" => TaskType::Math,
            "factual" => TaskType::Factual,
            "cad" => TaskType::Cad,
            _ => TaskType::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::General => "general",
            TaskType::Code => "code",
            TaskType::Creative => "creative",
            TaskType::Analysis => "analysis",
            TaskType::Math => "math",
            TaskType::Factual => "factual",
            TaskType::Cad => "cad",
        }
    }
}

/// Task complexity, driving the capability gate and quality multiplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ComplexityLevel {
    /// Parse a complexity string; unknown strings fall back to `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "low" => ComplexityLevel::Low,
            "high" => ComplexityLevel::High,
            _ => ComplexityLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "low",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("CLAUDE"), Some(Provider::Claude));
        assert_eq!(Provider::parse("claude"), Some(Provider::Claude));
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::OpenAi));
        assert_eq!(Provider::parse("mistral"), None);
    }

    #[test]
    fn metadata_builder() {
        let meta = ModelMetadata::new(Provider::Claude)
            .with_context_size(200_000)
            .with_costs(3e-6, 15e-6)
            .with_latency_ms(2500);

        assert_eq!(meta.provider, Provider::Claude);
        assert_eq!(meta.context_size, 200_000);
        assert!((meta.cost_per_output_token - 15e-6).abs() < 1e-12);
    }

    #[test]
    fn metadata_patch_only_overwrites_set_fields() {
        let mut meta = ModelMetadata::new(Provider::Claude)
            .with_context_size(100_000)
            .with_latency_ms(2000);

        meta.apply(&MetadataPatch {
            average_response_time_ms: Some(900),
            ..Default::default()
        });

        assert_eq!(meta.average_response_time_ms, 900);
        assert_eq!(meta.context_size, 100_000);
        assert_eq!(meta.provider, Provider::Claude);
    }

    #[test]
    fn task_type_falls_back_to_general() {
        assert_eq!(TaskType::parse("code"), TaskType::Code);
        assert_eq!(TaskType::parse("poetry"), TaskType::General);
    }
}
