//! Completion response types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Provider;
use crate::error::ErrorKind;

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from prompt/completion counts; total is derived.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Counterfactual spend a cache hit avoided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    /// Tokens the provider would have billed.
    pub tokens: u32,
    /// Estimated dollar cost avoided.
    pub cost: f64,
    /// Elapsed time between dispatch and serving the hit.
    pub time: Duration,
}

/// Terminal error carried on a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub kind: ErrorKind,
    pub message: String,
}

/// The single response every submitted request resolves to.
///
/// The executor never throws across the pipeline boundary: failures are
/// responses with `success = false` and a populated `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub success: bool,
    /// Raw completion text. Retained even when the parser fails.
    pub text: String,
    /// Parser output, when a parser was attached and succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
    /// Model that produced (or originally produced, for cache hits) the text.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Submit-to-response wall time.
    pub processing_time: Duration,
    pub from_cache: bool,
    /// Cosine similarity of the semantic hit, when one was served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    /// Populated exactly when `from_cache` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<Savings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl CompletionResponse {
    /// A successful provider-backed response.
    pub fn completed(
        text: impl Into<String>,
        model: impl Into<String>,
        provider: Provider,
        usage: Usage,
        processing_time: Duration,
    ) -> Self {
        Self {
            success: true,
            text: text.into(),
            parsed: None,
            model: model.into(),
            provider: Some(provider),
            usage: Some(usage),
            processing_time,
            from_cache: false,
            similarity: None,
            savings: None,
            error: None,
        }
    }

    /// A terminal failure response.
    pub fn failed(
        error: &crate::MuninnError,
        model: impl Into<String>,
        processing_time: Duration,
    ) -> Self {
        Self {
            success: false,
            text: String::new(),
            parsed: None,
            model: model.into(),
            provider: None,
            usage: None,
            processing_time,
            from_cache: false,
            similarity: None,
            savings: None,
            error: Some(ResponseError {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_is_derived() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn failed_response_carries_kind() {
        let err = crate::MuninnError::Timeout {
            elapsed: Duration::from_secs(30),
        };
        let response = CompletionResponse::failed(&err, "m", Duration::from_secs(30));
        assert!(!response.success);
        assert_eq!(response.error_kind(), Some(ErrorKind::Timeout));
    }
}
