//! OpenAI chat-completions provider
//!
//! Sends one system + one user message and returns the assistant's text. Works against any
//! OpenAI-compatible endpoint via `OPENAI_API_URL`.
use crate::{
    error::{AppError, AppResult},
    services::providers::{CompletionProvider, CompletionRequest},
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error code OpenAI attaches to request-rate 429s (quota exhaustion uses a different code)
const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Maps a non-success response to an error kind
    ///
    /// Only a 429 carrying the rate-limit code becomes `RateLimited`; everything else,
    /// including quota exhaustion, is a hard `ServiceUnavailable`.
    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(response) => {
                if status == StatusCode::TOO_MANY_REQUESTS
                    && response.error.code.as_deref() == Some(RATE_LIMIT_CODE)
                {
                    AppError::RateLimited(response.error.message)
                } else {
                    AppError::ServiceUnavailable(format!(
                        "OpenAI API returned status {} ({}): {}",
                        status,
                        response.error.code.as_deref().unwrap_or("unknown"),
                        response.error.message
                    ))
                }
            }
            Err(_) => AppError::ServiceUnavailable(format!(
                "OpenAI API returned status {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )),
        }
    }

    fn extract_content(body: &str) -> AppResult<String> {
        let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
            tracing::error!(error = %e, "Failed to deserialize OpenAI response envelope");
            AppError::ServiceUnavailable(format!("Failed to parse OpenAI response: {}", e))
        })?;

        // Missing content is returned as "" and rejected downstream as a malformed reply
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = "openai", "Completion request failed");
                AppError::ServiceUnavailable(format!("Failed to reach OpenAI: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::ServiceUnavailable(format!("Failed to read OpenAI response: {}", e))
        })?;

        if !status.is_success() {
            let error = Self::parse_error_response(status, &text);
            tracing::warn!(status = %status, error = %error, provider = "openai", "Completion rejected");
            return Err(error);
        }

        let content = Self::extract_content(&text)?;

        tracing::info!(
            model = %self.model,
            reply_chars = content.len(),
            provider = "openai",
            "Completion received"
        );

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
