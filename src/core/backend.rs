//! Generative backend: a chat completions endpoint that may call tools.

use crate::api::{
    ChatCompletionResponse, ChatMessage, ChatRequest, ChatToolCall, ChatToolDefinition,
};
use crate::core::config::data::BackendConfig;
use crate::core::error::SessionError;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Functions the model may call; empty for plain text generation.
    pub tools: Vec<ChatToolDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: Option<String>,
    pub tool_calls: Vec<ChatToolCall>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// One model round trip. Tool calls are returned, not executed.
    async fn complete(&self, request: GenerationRequest) -> Result<Generation, SessionError>;
}

/// Plain text generation for a single user prompt.
pub async fn generate_text(
    backend: &dyn GenerativeBackend,
    model: &str,
    prompt: &str,
) -> Result<String, SessionError> {
    let generation = backend
        .complete(GenerationRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            tools: Vec::new(),
        })
        .await?;
    Ok(generation.text.unwrap_or_default())
}

pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatCompletionsBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SessionError::GenerationFailure(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, SessionError> {
        Self::new(
            config.base_url(),
            config.api_key(),
            Duration::from_secs(config.timeout_secs()),
        )
    }
}

#[async_trait]
impl GenerativeBackend for ChatCompletionsBackend {
    async fn complete(&self, request: GenerationRequest) -> Result<Generation, SessionError> {
        let url = construct_api_url(&self.base_url, "chat/completions");
        debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );
        let body = ChatRequest {
            model: request.model,
            messages: request.messages,
            stream: false,
            tools: (!request.tools.is_empty()).then_some(request.tools),
        };

        let http_request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        let response = add_auth_headers(http_request, self.api_key.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|err| SessionError::GenerationFailure(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SessionError::GenerationFailure(err.to_string()))?;
        if !status.is_success() {
            return Err(SessionError::GenerationFailure(format_api_error(&text)));
        }

        parse_completion(&text)
    }
}

fn parse_completion(body: &str) -> Result<Generation, SessionError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|_| SessionError::GenerationFailure(format_api_error(body)))?;
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        SessionError::GenerationFailure("The model returned no choices.".to_string())
    })?;
    debug!(finish_reason = ?choice.finish_reason, "Chat completion received");
    Ok(Generation {
        text: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    // Gemini's compatibility layer wraps errors in a one-element array.
    let value = value
        .as_array()
        .and_then(|items| items.first())
        .unwrap_or(value);
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed)
}

fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API Error: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return format!("API Error: {summary}");
        }
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return format!("API Error:\n{pretty_json}");
        }
    }

    format!("API Error: {trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_comes_from_nested_error_message() {
        let body = r#"{"error": {"message": "API key   not\nvalid", "code": 400}}"#;
        assert_eq!(format_api_error(body), "API Error: API key not valid");
    }

    #[test]
    fn array_wrapped_errors_are_unwrapped() {
        let body = r#"[{"error": {"code": 429, "message": "Resource exhausted"}}]"#;
        assert_eq!(format_api_error(body), "API Error: Resource exhausted");
    }

    #[test]
    fn json_without_message_is_pretty_printed() {
        assert_eq!(format_api_error(r#"{"code":500}"#), "API Error:\n{\n  \"code\": 500\n}");
    }

    #[test]
    fn plain_text_and_empty_bodies() {
        assert_eq!(format_api_error("Bad Gateway"), "API Error: Bad Gateway");
        assert_eq!(format_api_error("  "), "API Error: <empty response>");
    }

    #[test]
    fn completion_keeps_text_and_tool_calls() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": "Creating the user now.",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "create-user", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let generation = parse_completion(body).expect("completion");
        assert_eq!(generation.text.as_deref(), Some("Creating the user now."));
        assert_eq!(generation.tool_calls[0].id, "call_1");
        assert_eq!(generation.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn empty_choices_is_a_generation_failure() {
        let err = parse_completion(r#"{"choices": []}"#).expect_err("no choices");
        assert_eq!(
            err,
            SessionError::GenerationFailure("The model returned no choices.".to_string())
        );
    }
}
