//! Free-text queries answered by the model, which may call server tools.

use crate::api::{ChatMessage, ChatToolCall, ChatToolDefinition, ChatToolFunction};
use crate::core::backend::{GenerationRequest, GenerativeBackend};
use crate::core::error::{CapabilityKind, SessionError};
use crate::mcp::capabilities::ToolDescriptor;
use crate::mcp::peer::Peer;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_TEXT_GENERATED: &str = "No Text Generated";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    /// Text from the last model round trip.
    pub text: Option<String>,
    pub tool_results: Vec<ToolCallResult>,
}

/// Exposes every tool as a function the model may call. Input schemas are
/// passed through as-is.
pub fn tool_definitions(tools: &[ToolDescriptor]) -> Vec<ChatToolDefinition> {
    tools
        .iter()
        .map(|tool| ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

/// Direct text wins; otherwise the first tool result's `context[0]`;
/// otherwise a fixed sentinel.
pub fn select_output(outcome: &QueryOutcome) -> String {
    if let Some(text) = outcome.text.as_deref().filter(|text| !text.is_empty()) {
        return text.to_string();
    }

    let context = outcome
        .tool_results
        .first()
        .and_then(|first| first.result.pointer("/context/0"));
    match context {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::String(_)) | Some(Value::Null) | None => NO_TEXT_GENERATED.to_string(),
        Some(other) => other.to_string(),
    }
}

fn error_result(message: impl Into<String>) -> Value {
    json!({ "isError": true, "error": message.into() })
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("Tool arguments must be a JSON object, got {other}")),
        Err(err) => Err(format!("Invalid tool arguments: {err}")),
    }
}

pub struct QueryEngine {
    backend: Arc<dyn GenerativeBackend>,
    peer: Arc<dyn Peer>,
    model: String,
    max_steps: u32,
}

impl QueryEngine {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        peer: Arc<dyn Peer>,
        model: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        Self {
            backend,
            peer,
            model: model.into(),
            max_steps: max_steps.max(1),
        }
    }

    /// Never fails; see [`select_output`].
    pub async fn query(&self, text: &str, tools: &[ToolDescriptor]) -> String {
        select_output(&self.run(text, tools).await)
    }

    /// Runs up to `max_steps` model round trips. Tool calls are executed in
    /// the order the model made them, and their results are fed back when
    /// another round trip remains.
    pub async fn run(&self, text: &str, tools: &[ToolDescriptor]) -> QueryOutcome {
        let definitions = tool_definitions(tools);
        let mut messages = vec![ChatMessage::user(text)];
        let mut outcome = QueryOutcome::default();

        for step in 1..=self.max_steps {
            debug!(step, max_steps = self.max_steps, "Query round trip");
            let generation = match self
                .backend
                .complete(GenerationRequest {
                    model: self.model.clone(),
                    messages: messages.clone(),
                    tools: definitions.clone(),
                })
                .await
            {
                Ok(generation) => generation,
                Err(err) => {
                    warn!(step, error = %err, "Query generation failed");
                    outcome.text = None;
                    break;
                }
            };

            outcome.text = generation.text.clone();
            if generation.tool_calls.is_empty() {
                break;
            }

            let mut replies = Vec::with_capacity(generation.tool_calls.len());
            for call in &generation.tool_calls {
                let result = self.execute(call, tools).await;
                replies.push(ChatMessage::tool_result(call.id.clone(), result.result.to_string()));
                outcome.tool_results.push(result);
            }

            if step < self.max_steps {
                messages.push(ChatMessage::assistant_tool_calls(
                    generation.text,
                    generation.tool_calls,
                ));
                messages.extend(replies);
            }
        }

        outcome
    }

    async fn execute(&self, call: &ChatToolCall, tools: &[ToolDescriptor]) -> ToolCallResult {
        let name = call.function.name.clone();
        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(message) => {
                warn!(tool = %name, error = %message, "Model sent unusable tool arguments");
                return ToolCallResult {
                    tool_name: name,
                    arguments: Value::String(call.function.arguments.clone()),
                    result: error_result(message),
                };
            }
        };

        let result = if tools.iter().any(|tool| tool.name == name) {
            debug!(tool = %name, "Calling MCP tool for query");
            match self.peer.call_tool(&name, arguments.clone()).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(tool = %name, error = %err, "MCP tool call failed during query");
                    error_result(err.to_string())
                }
            }
        } else {
            error_result(SessionError::not_found(CapabilityKind::Tool, &name).to_string())
        };

        ToolCallResult {
            tool_name: name,
            arguments: Value::Object(arguments),
            result,
        }
    }
}
