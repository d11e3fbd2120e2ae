//! Completion request types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Capability, ComplexityLevel, McpParams, TaskType};
use crate::{MuninnError, Result};

/// Scheduling priority for a submitted request.
///
/// Weights are strictly ordered High > Normal > Low; ties within a band
/// break oldest-first by sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl RequestPriority {
    /// Queue weight; higher pops first.
    pub fn weight(&self) -> u32 {
        match self {
            RequestPriority::High => 100,
            RequestPriority::Normal => 50,
            RequestPriority::Low => 10,
        }
    }
}

/// Parser capability attached to a request.
///
/// Invoked by the executor on the raw completion text after a successful
/// provider call. Must be pure; a returned error surfaces as a
/// `ParseError` response that still carries the raw text.
pub type ResponseParser =
    Arc<dyn Fn(&str) -> std::result::Result<serde_json::Value, String> + Send + Sync>;

/// Typed request metadata the router inspects, plus an opaque bag for
/// everything else the caller wants to carry through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityLevel>,
    /// Free-form type/priority hint (e.g. "interactive_message",
    /// "background_analysis") used for priority inference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub requires_reasoning: bool,
    #[serde(default)]
    pub requires_code: bool,
    #[serde(default)]
    pub requires_math: bool,
    #[serde(default)]
    pub requires_factual: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output_tokens: Option<u32>,
    /// Opaque caller metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestMetadata {
    /// Capabilities the `requires_*` flags gate on.
    pub fn required_capabilities(&self) -> Vec<Capability> {
        let mut required = Vec::new();
        if self.requires_reasoning {
            required.push(Capability::Reasoning);
        }
        if self.requires_code {
            required.push(Capability::CodeGeneration);
        }
        if self.requires_math {
            required.push(Capability::MathPrecision);
        }
        if self.requires_factual {
            required.push(Capability::FactualAccuracy);
        }
        required
    }
}

/// A single completion request.
///
/// Built with [`CompletionRequest::new`] and the `with_*` setters,
/// validated at submit. Owned by the pipeline from submission until its
/// response is delivered.
#[derive(Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Explicit model id; `None` lets the smart router pick.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Explicit scheduling priority; `None` infers from metadata.
    pub priority: Option<RequestPriority>,
    pub metadata: RequestMetadata,
    /// Explicit cache/routing parameters; `None` uses the active
    /// strategy preset.
    pub mcp: Option<McpParams>,
    pub parser: Option<ResponseParser>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
            priority: None,
            metadata: RequestMetadata::default(),
            mcp: None,
            parser: None,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_mcp(mut self, params: McpParams) -> Self {
        self.mcp = Some(params);
        self
    }

    /// Attach a parser run on the raw completion text.
    pub fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Validate request shape. Model existence is checked by the pipeline,
    /// which owns the router.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(MuninnError::InvalidRequest("prompt is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(MuninnError::InvalidRequest(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(MuninnError::InvalidRequest(
                "max_tokens must be positive".into(),
            ));
        }
        match &self.mcp {
            Some(params) => params.validate(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("prompt", &self.prompt)
            .field("system_prompt", &self.system_prompt)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("priority", &self.priority)
            .field("mcp", &self.mcp)
            .field("parser", &self.parser.as_ref().map(|_| "<fn>"))
            .finish_non_exhaustive()
    }
}
