use crate::core::config::data::ServerConfig;
use crate::mcp::capabilities::{
    PromptDescriptor, ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor,
};
use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{InitializeResult, RequestId, RpcError, LATEST_PROTOCOL_VERSION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// JSON-RPC code used by servers to indicate unsupported methods.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

/// A response to one of our requests, with the result kept as raw JSON.
///
/// Results are not routed through the typed schema so that tool input
/// schemas reach the backend exactly as the server declared them.
#[derive(Debug, Clone)]
pub(crate) struct ResponseEnvelope {
    pub id: RequestId,
    pub outcome: Result<Value, RpcError>,
}

/// A decoded line from the server's stdout.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response(ResponseEnvelope),
    Message(ServerMessage),
}

/// Splits responses from server-initiated traffic. Anything carrying a
/// `method` is a request or notification; anything with `result` or `error`
/// and an id is a response.
pub(crate) fn decode_incoming(value: Value) -> Result<Incoming, String> {
    let is_response = value.get("method").is_none()
        && (value.get("result").is_some() || value.get("error").is_some());
    if !is_response {
        return serde_json::from_value::<ServerMessage>(value)
            .map(Incoming::Message)
            .map_err(|err| err.to_string());
    }

    let id = value
        .get("id")
        .filter(|id| !id.is_null())
        .cloned()
        .ok_or_else(|| "MCP response without an id.".to_string())
        .and_then(|id| serde_json::from_value::<RequestId>(id).map_err(|err| err.to_string()))?;

    let outcome = match value.get("error") {
        Some(error) => Err(serde_json::from_value::<RpcError>(error.clone())
            .map_err(|err| format!("Malformed MCP error: {err}"))?),
        None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
    };

    Ok(Incoming::Response(ResponseEnvelope { id, outcome }))
}

/// One page of a list call.
pub(crate) trait ListPage: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

macro_rules! list_page {
    ($page:ident, $item:ty, $field:literal) => {
        #[derive(Deserialize)]
        pub(crate) struct $page {
            #[serde(rename = $field, default)]
            items: Vec<$item>,
            #[serde(rename = "nextCursor", default)]
            next_cursor: Option<String>,
        }

        impl ListPage for $page {
            type Item = $item;

            fn into_parts(self) -> (Vec<$item>, Option<String>) {
                (self.items, self.next_cursor)
            }
        }
    };
}

list_page!(ToolsPage, ToolDescriptor, "tools");
list_page!(PromptsPage, PromptDescriptor, "prompts");
list_page!(ResourcesPage, ResourceDescriptor, "resources");
list_page!(
    ResourceTemplatesPage,
    ResourceTemplateDescriptor,
    "resourceTemplates"
);

#[derive(Deserialize)]
pub(crate) struct ReadResourcePayload {
    #[serde(default)]
    pub contents: Vec<crate::mcp::capabilities::ResourceContent>,
}

pub(crate) fn requested_protocol_version(config: &ServerConfig) -> String {
    config
        .protocol_version
        .clone()
        .filter(|version| !version.trim().is_empty())
        .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string())
}

pub(crate) fn parse_initialize_result(
    response: ResponseEnvelope,
) -> Result<InitializeResult, String> {
    let value = parse_response_value(response)?;
    let result =
        serde_json::from_value::<InitializeResult>(value).map_err(|err| err.to_string())?;
    if result.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(result)
}

pub(crate) fn parse_response<T: DeserializeOwned>(response: ResponseEnvelope) -> Result<T, String> {
    let value = parse_response_value(response)?;
    serde_json::from_value::<T>(value).map_err(|err| format!("Malformed MCP result: {err}"))
}

pub(crate) fn parse_response_value(response: ResponseEnvelope) -> Result<Value, String> {
    response.outcome.map_err(|error| format_rpc_error(&error))
}

pub(crate) fn is_method_not_found(response: &ResponseEnvelope) -> bool {
    matches!(&response.outcome, Err(error) if error.code == MCP_METHOD_NOT_FOUND)
}

pub(crate) fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    let details = error.data.as_ref().and_then(|data| {
        data.get("details")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| data.as_str().map(str::to_string))
            .or_else(|| serde_json::to_string_pretty(data).ok())
    });
    if let Some(details) = details.filter(|details| !details.is_empty()) {
        output.push('\n');
        output.push_str(&details);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> ResponseEnvelope {
        match decode_incoming(value).expect("line should decode") {
            Incoming::Response(response) => response,
            Incoming::Message(other) => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn parse_initialize_rejects_blank_protocol_version() {
        let response = response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "capabilities": {},
                "protocolVersion": " ",
                "serverInfo": {"name": "x", "version": "1.0.0"}
            }
        }));

        assert!(parse_initialize_result(response).is_err());
    }

    #[test]
    fn requested_protocol_falls_back_to_latest() {
        let mut config = ServerConfig::default();
        assert_eq!(requested_protocol_version(&config), LATEST_PROTOCOL_VERSION);

        config.protocol_version = Some("2025-06-18".to_string());
        assert_eq!(requested_protocol_version(&config), "2025-06-18");
    }

    #[test]
    fn tools_page_keeps_cursor_and_property_order() {
        let page: ToolsPage = parse_response(response(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": {
                "tools": [{
                    "name": "create-user",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "email": {"type": "string"},
                            "age": {"type": "integer"}
                        }
                    }
                }],
                "nextCursor": "page-2"
            }
        })))
        .expect("page should parse");

        let (tools, cursor) = page.into_parts();
        assert_eq!(cursor.as_deref(), Some("page-2"));
        let names: Vec<String> = tools[0].params().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["name", "email", "age"]);
    }

    #[test]
    fn rpc_errors_carry_code_and_details() {
        let response = response(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "error": {
                "code": -32602,
                "message": "Invalid params",
                "data": {"details": "email must be a string"}
            }
        }));

        assert!(!is_method_not_found(&response));
        let err = parse_response_value(response).expect_err("error response");
        assert_eq!(err, "MCP error -32602: Invalid params\nemail must be a string");
    }

    #[test]
    fn method_not_found_is_recognized() {
        let response = response(json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "error": {"code": -32601, "message": "Method not found"}
        }));
        assert!(is_method_not_found(&response));
        assert_eq!(response.id, RequestId::String("abc".to_string()));
    }

    #[test]
    fn requests_and_notifications_stay_typed() {
        let incoming = decode_incoming(json!({
            "jsonrpc": "2.0",
            "method": "notifications/tools/list_changed"
        }))
        .expect("notification should decode");
        assert!(matches!(
            incoming,
            Incoming::Message(ServerMessage::Notification(_))
        ));
    }

    #[test]
    fn responses_without_id_are_rejected() {
        let err = decode_incoming(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32700, "message": "Parse error"}
        }))
        .expect_err("unroutable response");
        assert_eq!(err, "MCP response without an id.");
    }
}
