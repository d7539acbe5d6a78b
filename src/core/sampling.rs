//! Serves `sampling/createMessage`: each text message is shown to the
//! operator, who decides whether it goes to the generative backend.

use crate::core::backend::{generate_text, GenerativeBackend};
use crate::ui::operator::Operator;
use rust_mcp_schema::{
    CreateMessageContent, CreateMessageRequest, CreateMessageResult, Role, SamplingMessage,
    SamplingMessageContent, SamplingMessageContentBlock, TextContent,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const RUN_PROMPT_CONFIRMATION: &str = "Would you like to run the prompt";
pub const SAMPLING_STOP_REASON: &str = "endTurn";

pub fn summarize_sampling_request(request: &CreateMessageRequest) -> String {
    let message_count = request.params.messages.len();
    let max_tokens = request.params.max_tokens;
    let system_prompt = request
        .params
        .system_prompt
        .as_deref()
        .map(|prompt| format!("system prompt: {}", summarize_prompt(prompt)))
        .unwrap_or_else(|| "system prompt: none".to_string());
    format!("messages: {message_count}, maxTokens: {max_tokens}, {system_prompt}")
}

/// The text of a sampling message, or `None` when it carries no text at all.
/// Block arrays contribute their text blocks joined by newlines.
pub fn sampling_message_text(message: &SamplingMessage) -> Option<String> {
    match &message.content {
        SamplingMessageContent::TextContent(text) => Some(text.text.clone()),
        SamplingMessageContent::SamplingMessageContentBlock(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| match block {
                    SamplingMessageContentBlock::TextContent(TextContent { text, .. }) => {
                        Some(text.as_str())
                    }
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

fn summarize_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.chars().count() <= 48 {
        trimmed.to_string()
    } else {
        let mut truncated = trimmed.chars().take(48).collect::<String>();
        truncated.push('…');
        truncated
    }
}

pub struct SamplingBridge {
    backend: Arc<dyn GenerativeBackend>,
    operator: Arc<dyn Operator>,
    model: String,
}

impl SamplingBridge {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        operator: Arc<dyn Operator>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            operator,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Shows one text message and, if the operator agrees, generates from it.
    /// Declines, input failures, and backend errors all yield `None`.
    pub async fn run_message(&self, text: &str) -> Option<String> {
        let confirmed = match self
            .operator
            .review(text, RUN_PROMPT_CONFIRMATION, true)
            .await
        {
            Ok(confirmed) => confirmed,
            Err(err) => {
                warn!(error = %err, "Sampling confirmation failed; skipping message");
                return None;
            }
        };
        if !confirmed {
            debug!("Sampling message declined");
            return None;
        }

        debug!(model = %self.model, "Generating from sampling message");
        match generate_text(self.backend.as_ref(), &self.model, text).await {
            Ok(generated) => Some(generated),
            Err(err) => {
                warn!(error = %err, "Sampling generation failed; skipping message");
                None
            }
        }
    }

    /// Runs every message in order and always answers, possibly with empty
    /// text. Only generated outputs are joined into the reply.
    pub async fn handle(&self, request: &CreateMessageRequest) -> CreateMessageResult {
        debug!(
            request_id = ?request.id,
            summary = %summarize_sampling_request(request),
            "Sampling request received"
        );

        let mut outputs = Vec::new();
        for (index, message) in request.params.messages.iter().enumerate() {
            let Some(text) = sampling_message_text(message) else {
                debug!(index, "Skipping non-text sampling message");
                continue;
            };
            if let Some(generated) = self.run_message(&text).await {
                outputs.push(generated);
            }
        }

        CreateMessageResult {
            content: CreateMessageContent::from(TextContent::new(outputs.join("\n"), None, None)),
            meta: None,
            model: self.model.clone(),
            role: Role::Assistant,
            stop_reason: Some(SAMPLING_STOP_REASON.to_string()),
        }
    }
}
