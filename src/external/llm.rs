// ABOUTME: LLM provider abstraction for AI health insights and nutrition estimates
// ABOUTME: Gemini generateContent client plus a provider that reports missing configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # LLM providers
//!
//! Routes talk to an [`LlmProvider`] trait object so tests can substitute a
//! canned provider. [`GeminiProvider`] speaks the Gemini `generateContent`
//! REST API, which also serves `MedGemma` models. When no API key is
//! configured the server installs [`UnconfiguredProvider`], and AI endpoints
//! answer 502 instead of failing at startup.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::config::GeminiConfig;
use crate::errors::{AppError, AppResult};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model
    System,
    /// End-user text
    User,
    /// Prior model output
    Assistant,
}

/// One message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: MessageRole,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// System instruction
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// User turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Model turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation, system messages first
    pub messages: Vec<ChatMessage>,
    /// Model override
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Output cap
    pub max_output_tokens: u32,
}

impl ChatRequest {
    /// Request with conservative sampling defaults
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }

    /// Use a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Generated tokens
    pub completion_tokens: u32,
}

/// A completion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Generated text
    pub content: String,
    /// Model that answered
    pub model: String,
    /// Token usage when reported
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// A text-generation backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short identifier
    fn name(&self) -> &'static str;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;

    /// Generate a reply
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse>;
}

/// Build the provider for the configured credentials
#[must_use]
pub fn provider_from_config(config: &GeminiConfig) -> Arc<dyn LlmProvider> {
    match &config.api_key {
        Some(_) => Arc::new(GeminiProvider::new(config.clone())),
        None => {
            warn!("GEMINI_API_KEY not set; AI endpoints are disabled");
            Arc::new(UnconfiguredProvider)
        }
    }
}

/// Stand-in when no LLM is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    fn default_model(&self) -> &'static str {
        "none"
    }

    async fn complete(&self, _request: &ChatRequest) -> AppResult<ChatResponse> {
        Err(AppError::external_service(
            "AI provider",
            "No AI provider is configured",
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini `generateContent` client
pub struct GeminiProvider {
    config: GeminiConfig,
    http_client: Client,
}

impl GeminiProvider {
    /// Create a provider
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http_client: Client::new(),
        }
    }

    fn request_body(request: &ChatRequest) -> serde_json::Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| {
                let role = if m.role == MessageRole::Assistant {
                    "model"
                } else {
                    "user"
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }

    fn into_response(model: String, body: GenerateResponse) -> AppResult<ChatResponse> {
        let candidate = body.candidates.into_iter().next().ok_or_else(|| {
            AppError::external_service("Gemini", "Response contained no candidates")
        })?;
        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AppError::external_service(
                "Gemini",
                format!(
                    "Empty reply (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(ChatResponse {
            content,
            model,
            usage: body.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            }),
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(provider = "gemini"))]
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::external_service("Gemini", "API key missing"))?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let url = format!("{}/models/{model}:generateContent", self.config.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| AppError::external_service("Gemini", e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::external_service("Gemini", "Upstream rate limit reached"));
        }
        if !status.is_success() {
            return Err(AppError::external_service(
                "Gemini",
                format!("generateContent failed with HTTP {status}"),
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("Gemini", format!("JSON parse error: {e}")))?;
        let reply = Self::into_response(model, body)?;
        debug!(usage = ?reply.usage, "Gemini reply received");
        Ok(reply)
    }
}
