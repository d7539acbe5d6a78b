//! Descriptors for the capabilities a server advertises.
//!
//! These are parsed straight from the JSON results of the list calls so the
//! tool input schema survives untouched (property order included) for the
//! generative backend.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Declared type of a single argument, taken from a tool's input schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    Unspecified,
}

impl ParamKind {
    /// Reads the `type` keyword of a JSON schema fragment. Union types such
    /// as `["string", "null"]` resolve to their first non-null member.
    pub fn from_schema(schema: &Value) -> Self {
        match schema.get("type") {
            Some(Value::String(name)) => Self::from_name(name),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null")
                .map(Self::from_name)
                .unwrap_or(ParamKind::Null),
            _ => ParamKind::Unspecified,
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "string" => ParamKind::String,
            "number" => ParamKind::Number,
            "integer" => ParamKind::Integer,
            "boolean" => ParamKind::Boolean,
            "array" => ParamKind::Array,
            "object" => ParamKind::Object,
            "null" => ParamKind::Null,
            _ => ParamKind::Unspecified,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Null => "null",
            ParamKind::Unspecified => "any",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: ParamKind,
    pub optional: bool,
}

impl ParamDescriptor {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(default)]
    pub annotations: Option<ToolAnnotations>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolAnnotations {
    #[serde(default)]
    pub title: Option<String>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    /// Name shown in menus: the annotation title, then the tool title, then
    /// the bare name.
    pub fn label(&self) -> &str {
        self.annotations
            .as_ref()
            .and_then(|annotations| annotations.title.as_deref())
            .or(self.title.as_deref())
            .unwrap_or(&self.name)
    }

    /// Parameters in schema declaration order.
    pub fn params(&self) -> Vec<ParamDescriptor> {
        let required: Vec<&str> = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let Some(properties) = self
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };

        properties
            .iter()
            .map(|(name, schema)| ParamDescriptor {
                name: name.clone(),
                kind: ParamKind::from_schema(schema),
                optional: !required.contains(&name.as_str()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptArgumentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgumentDescriptor>,
}

impl PromptDescriptor {
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Prompt arguments are always collected as text.
    pub fn params(&self) -> Vec<ParamDescriptor> {
        self.arguments
            .iter()
            .map(|argument| ParamDescriptor {
                name: argument.name.clone(),
                kind: ParamKind::String,
                optional: !argument.required.unwrap_or(false),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDescriptor {
    pub uri_template: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// One entry of a `resources/read` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub blob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptTranscript {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// First text item of a `tools/call` result's `content` array.
pub fn first_text_content(result: &Value) -> Option<&str> {
    result
        .get("content")
        .and_then(Value::as_array)?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
}

/// Whether a `tools/call` result carries `isError: true`.
pub fn is_error_result(result: &Value) -> bool {
    result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Text answers become a JSON object of string values.
pub fn string_arguments<'a>(
    arguments: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Map<String, Value> {
    arguments
        .into_iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(schema: Value) -> ToolDescriptor {
        serde_json::from_value(json!({
            "name": "lookup",
            "inputSchema": schema
        }))
        .expect("tool should parse")
    }

    #[test]
    fn params_follow_declaration_order_and_required_list() {
        let tool = tool(json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "integer"},
                "mid": {"type": ["number", "null"]}
            },
            "required": ["zeta"]
        }));

        let params = tool.params();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(!params[0].optional);
        assert!(params[1].optional);
        assert_eq!(params[1].kind, ParamKind::Integer);
        assert_eq!(params[2].kind, ParamKind::Number);
    }

    #[test]
    fn missing_schema_yields_no_params() {
        let tool: ToolDescriptor =
            serde_json::from_value(json!({"name": "ping"})).expect("tool should parse");
        assert!(tool.params().is_empty());
        assert_eq!(tool.label(), "ping");
    }

    #[test]
    fn untyped_property_is_unspecified() {
        let tool = tool(json!({"properties": {"blob": {"description": "anything"}}}));
        assert_eq!(tool.params()[0].kind, ParamKind::Unspecified);
        assert_eq!(tool.params()[0].kind.to_string(), "any");
    }

    #[test]
    fn annotation_title_wins_for_label() {
        let tool: ToolDescriptor = serde_json::from_value(json!({
            "name": "create-user",
            "title": "Create user",
            "annotations": {"title": "New user"}
        }))
        .expect("tool should parse");
        assert_eq!(tool.label(), "New user");
    }

    #[test]
    fn prompt_arguments_are_strings() {
        let prompt: PromptDescriptor = serde_json::from_value(json!({
            "name": "greet",
            "arguments": [
                {"name": "who", "required": true},
                {"name": "tone"}
            ]
        }))
        .expect("prompt should parse");

        let params = prompt.params();
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|p| p.kind == ParamKind::String));
        assert!(!params[0].optional);
        assert!(params[1].optional);
    }

    #[test]
    fn prompt_message_content_marks_non_text_as_other() {
        let transcript: PromptTranscript = serde_json::from_value(json!({
            "messages": [
                {"role": "user", "content": {"type": "text", "text": "hello"}},
                {"role": "user", "content": {"type": "image", "data": "AA==", "mimeType": "image/png"}}
            ]
        }))
        .expect("transcript should parse");

        assert_eq!(transcript.messages[0].content.as_text(), Some("hello"));
        assert_eq!(transcript.messages[1].content, MessageContent::Other);
    }

    #[test]
    fn first_text_content_skips_other_items() {
        let result = json!({
            "content": [
                {"type": "image", "data": "AA==", "mimeType": "image/png"},
                {"type": "text", "text": "done"}
            ]
        });
        assert_eq!(first_text_content(&result), Some("done"));
        assert!(!is_error_result(&result));
        assert!(is_error_result(&json!({"content": [], "isError": true})));
    }
}
