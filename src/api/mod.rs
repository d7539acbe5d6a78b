//! OpenAI-compatible chat completions payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_TOOL: &str = "tool";

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ChatToolCall>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.unwrap_or_default(),
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ROLE_TOOL.to_string(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatToolDefinition>>,
}

#[derive(Deserialize)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: ChatToolCallFunction,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatToolCallFunction {
    pub name: String,
    /// JSON-encoded argument object, as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ChatToolFunction,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatToolFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_response_parses_without_id_or_type() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "function": {"name": "create-user", "arguments": "{\"name\":\"Ann\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .expect("response should parse");

        let choice = &response.choices[0];
        assert_eq!(choice.message.content, None);
        let calls = choice.message.tool_calls.as_ref().expect("tool calls");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].id, "");
        assert_eq!(calls[0].function.name, "create-user");
    }

    #[test]
    fn request_omits_empty_optionals() {
        let request = ChatRequest {
            model: "gemini-2.0-flash".to_string(),
            messages: vec![ChatMessage::user("hi")],
            stream: false,
            tools: None,
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({
                "model": "gemini-2.0-flash",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn tool_result_message_links_call_id() {
        let message = ChatMessage::tool_result("call_1", "{\"ok\":true}");
        assert_eq!(
            serde_json::to_value(&message).expect("serialize"),
            json!({"role": "tool", "content": "{\"ok\":true}", "tool_call_id": "call_1"})
        );
    }
}
