// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for an OpenAI-compatible chat completions API.

use crate::config::Config;
use crate::error::AppError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.5;

/// Token accounting reported by the model API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A generated reply.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Language model API client.
#[derive(Clone)]
pub struct LanguageModelClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl LanguageModelClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: model.into(),
        })
    }

    /// Client from config, or `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        config
            .openai_api_key
            .as_ref()
            .map(|key| {
                Self::new(key.clone(), config.openai_model.clone(), config.http_timeout)
                    .map(|client| client.with_api_url(config.openai_api_url.clone()))
            })
            .transpose()
    }

    /// Point the client at a different API root.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Generate a reply to `message` under `system_prompt`.
    pub async fn generate(
        &self,
        system_prompt: &str,
        message: &str,
    ) -> Result<Completion, AppError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LanguageModel(format!("Request failed: {}", e)))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::LanguageModel("Rate limited".to_string()));
            }
            StatusCode::UNAUTHORIZED => {
                return Err(AppError::LanguageModel("Unauthorized".to_string()));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::LanguageModel(format!("HTTP {}: {}", status, body)));
            }
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::LanguageModel(format!("Malformed response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LanguageModel("Response had no content".to_string()))?;

        Ok(Completion {
            text,
            model: parsed.model,
            usage: parsed.usage,
        })
    }
}
