//! Provider gateway: HTTP egress and response normalization.
//!
//! The executor talks to an opaque [`ProviderGateway`] that accepts a
//! provider-agnostic request and returns a normalized completion.
//! Field-name translation into a specific provider's dialect lives
//! entirely here; nothing above this layer sees wire shapes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::types::{Provider, Usage};
use crate::{MuninnError, Result};

/// Default base URL for the Anthropic API.
const CLAUDE_BASE_URL: &str = "https://api.anthropic.com";

/// Default base URL for the OpenAI API.
const OPENAI_BASE_URL: &str = "https://api.openai.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Message role in a normalized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// One message in a normalized request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Provider-agnostic completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub model: String,
    pub messages: Vec<NormalizedMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Escape hatch for provider-specific extras, merged into the wire
    /// body as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

impl NormalizedRequest {
    /// Build a request from prompt parts.
    pub fn from_prompt(
        model: impl Into<String>,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(NormalizedMessage {
                role: MessageRole::System,
                content: system.to_string(),
            });
        }
        messages.push(NormalizedMessage {
            role: MessageRole::User,
            content: prompt.to_string(),
        });
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens,
            extras: None,
        }
    }

    fn system_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// Provider-agnostic completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub text: String,
    pub usage: Usage,
    /// Model id echoed by the provider.
    pub model: String,
}

/// Completion egress capability.
///
/// Errors distinguish transport failures, provider 5xx, provider 4xx,
/// and rate limits; the executor retries only the transient ones.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn complete(
        &self,
        provider: Provider,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse>;
}

struct Endpoint {
    api_key: String,
    base_url: String,
}

/// Reqwest-backed gateway speaking the Anthropic and OpenAI dialects.
///
/// API keys and base URLs are passed in at construction; the gateway
/// never reads ambient state.
pub struct HttpGateway {
    http: Client,
    claude: Option<Endpoint>,
    openai: Option<Endpoint>,
}

impl HttpGateway {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            claude: None,
            openai: None,
        }
    }

    /// Configure the Claude endpoint.
    pub fn claude(mut self, api_key: impl Into<String>) -> Self {
        self.claude = Some(Endpoint {
            api_key: api_key.into(),
            base_url: CLAUDE_BASE_URL.to_string(),
        });
        self
    }

    /// Override the Claude base URL (proxies, wiremock).
    pub fn claude_base_url(mut self, url: impl Into<String>) -> Self {
        if let Some(endpoint) = &mut self.claude {
            endpoint.base_url = url.into();
        }
        self
    }

    /// Configure the OpenAI endpoint.
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai = Some(Endpoint {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        });
        self
    }

    /// Override the OpenAI base URL (proxies, wiremock).
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        if let Some(endpoint) = &mut self.openai {
            endpoint.base_url = url.into();
        }
        self
    }

    async fn complete_claude(
        &self,
        endpoint: &Endpoint,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse> {
        let url = format!("{}/v1/messages", endpoint.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": user_text(request)}],
        });
        if let Some(system) = request.system_text() {
            body["system"] = serde_json::Value::String(system.to_string());
        }
        merge_extras(&mut body, request.extras.as_ref());

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let response = check_status(response, &request.model).await?;
        let reply: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let text: String = reply
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(MuninnError::EmptyResponse);
        }

        Ok(NormalizedResponse {
            text,
            usage: Usage::new(reply.usage.input_tokens, reply.usage.output_tokens),
            model: reply.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn complete_openai(
        &self,
        endpoint: &Endpoint,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse> {
        let url = format!("{}/v1/chat/completions", endpoint.base_url);

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        MessageRole::System => "system",
                        MessageRole::User => "user",
                    },
                    "content": m.content,
                })
            })
            .collect();
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        merge_extras(&mut body, request.extras.as_ref());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let response = check_status(response, &request.model).await?;
        let reply: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(MuninnError::EmptyResponse)?;

        Ok(NormalizedResponse {
            text,
            usage: Usage::new(reply.usage.prompt_tokens, reply.usage.completion_tokens),
            model: reply.model.unwrap_or_else(|| request.model.clone()),
        })
    }
}

impl Default for HttpGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderGateway for HttpGateway {
    async fn complete(
        &self,
        provider: Provider,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse> {
        match provider {
            Provider::Claude => {
                let endpoint = self
                    .claude
                    .as_ref()
                    .ok_or_else(|| MuninnError::ProviderNotConfigured("claude".into()))?;
                self.complete_claude(endpoint, request).await
            }
            Provider::OpenAi => {
                let endpoint = self
                    .openai
                    .as_ref()
                    .ok_or_else(|| MuninnError::ProviderNotConfigured("openai".into()))?;
                self.complete_openai(endpoint, request).await
            }
        }
    }
}

/// Concatenated user-message text for single-message dialects.
fn user_text(request: &NormalizedRequest) -> String {
    request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge provider-specific extras into the wire body.
fn merge_extras(body: &mut serde_json::Value, extras: Option<&serde_json::Value>) {
    if let (Some(target), Some(serde_json::Value::Object(extras))) =
        (body.as_object_mut(), extras)
    {
        for (key, value) in extras {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Map a non-success status to the error taxonomy.
async fn check_status(response: reqwest::Response, model: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(MuninnError::AuthenticationFailed),
        404 => Err(MuninnError::ModelNotFound(model.to_string())),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(MuninnError::RateLimited { retry_after })
        }
        code => {
            let message = response.text().await.unwrap_or_default();
            // Truncate on a char boundary; bodies are not always ASCII.
            let message = match message.char_indices().nth(512) {
                Some((idx, _)) => format!("{}…", &message[..idx]),
                None => message,
            };
            Err(MuninnError::Api {
                status: code,
                message,
            })
        }
    }
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    model: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: Option<String>,
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
