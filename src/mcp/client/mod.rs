//! MCP client session: handshake, paginated discovery, and invocations.

pub mod protocol;
pub mod transport_stdio;

use crate::core::config::data::ServerConfig;
use crate::core::error::SessionError;
use crate::mcp::capabilities::{
    PromptDescriptor, PromptTranscript, ResourceContent, ResourceDescriptor,
    ResourceTemplateDescriptor, ToolDescriptor,
};
use crate::mcp::events::McpServerRequest;
use crate::mcp::peer::{Peer, Responder};
use async_trait::async_trait;
use protocol::{
    is_method_not_found, parse_initialize_result, parse_response, parse_response_value,
    requested_protocol_version, ListPage, PromptsPage, ReadResourcePayload, ResourceTemplatesPage,
    ResourcesPage, ToolsPage,
};
use rust_mcp_schema::schema_utils::{NotificationFromClient, RequestFromClient};
use rust_mcp_schema::{
    CallToolRequestParams, ClientCapabilities, ClientSampling, GetPromptRequestParams,
    Implementation, InitializeRequestParams, InitializeResult, PaginatedRequestParams,
    ReadResourceRequestParams,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use transport_stdio::StdioClient;

/// Upper bound on pages fetched for a single list call.
const MCP_MAX_LIST_PAGES: usize = 64;

/// Capabilities we advertise: sampling only.
pub fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        sampling: Some(ClientSampling::default()),
        ..ClientCapabilities::default()
    }
}

fn client_details(config: &ServerConfig) -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: client_capabilities(),
        client_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Relais".to_string()),
            description: None,
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: requested_protocol_version(config),
    }
}

fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub struct McpClient {
    transport: Arc<StdioClient>,
    server_details: InitializeResult,
}

impl McpClient {
    /// Starts the server process and completes the `initialize` handshake.
    /// Requests the server sends us are forwarded on `request_tx`.
    pub async fn connect(
        server_id: impl Into<String>,
        config: &ServerConfig,
        request_tx: mpsc::UnboundedSender<McpServerRequest>,
    ) -> Result<Self, SessionError> {
        let transport = StdioClient::connect(server_id.into(), config, Some(request_tx))
            .await
            .map_err(SessionError::PeerUnavailable)?;

        let response = transport
            .send_request(RequestFromClient::InitializeRequest(client_details(config)))
            .await
            .map_err(SessionError::PeerUnavailable)?;
        let server_details =
            parse_initialize_result(response).map_err(SessionError::PeerUnavailable)?;
        transport
            .send_notification(NotificationFromClient::InitializedNotification(None))
            .await
            .map_err(SessionError::PeerUnavailable)?;

        debug!(
            server_id = %transport.server_id(),
            server = %server_details.server_info.name,
            protocol_version = %server_details.protocol_version,
            "MCP session initialized"
        );
        Ok(Self {
            transport,
            server_details,
        })
    }

    pub fn server_details(&self) -> &InitializeResult {
        &self.server_details
    }

    /// Handle for answering server-initiated requests.
    pub fn responder(&self) -> Arc<dyn Responder> {
        self.transport.clone()
    }

    pub fn shutdown(&self) {
        self.transport.shutdown();
    }

    async fn call(&self, request: RequestFromClient) -> Result<Value, SessionError> {
        let response = self
            .transport
            .send_request(request)
            .await
            .map_err(SessionError::PeerUnavailable)?;
        parse_response_value(response).map_err(SessionError::InvocationRejected)
    }

    /// Follows `nextCursor` until the server stops returning one.
    async fn list_all<P: ListPage>(
        &self,
        kind: &'static str,
        build: fn(Option<PaginatedRequestParams>) -> RequestFromClient,
    ) -> Result<Vec<P::Item>, SessionError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        for page_index in 0..MCP_MAX_LIST_PAGES {
            let response = self
                .transport
                .send_request(build(paginated_params(cursor.clone())))
                .await
                .map_err(SessionError::PeerUnavailable)?;
            if is_method_not_found(&response) {
                debug!(kind, "Server does not implement list method");
                return Ok(items);
            }
            let page: P = parse_response(response).map_err(SessionError::InvocationRejected)?;
            let (page_items, next_cursor) = page.into_parts();
            debug!(kind, page = page_index, count = page_items.len(), "Fetched MCP list page");
            items.extend(page_items);

            match next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                _ => return Ok(items),
            }
        }

        debug!(kind, pages = MCP_MAX_LIST_PAGES, "Stopped paging MCP list");
        Ok(items)
    }
}

#[async_trait]
impl Peer for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        self.list_all::<ToolsPage>("tools", RequestFromClient::ListToolsRequest)
            .await
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, SessionError> {
        self.list_all::<PromptsPage>("prompts", RequestFromClient::ListPromptsRequest)
            .await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SessionError> {
        self.list_all::<ResourcesPage>("resources", RequestFromClient::ListResourcesRequest)
            .await
    }

    async fn list_resource_templates(
        &self,
    ) -> Result<Vec<ResourceTemplateDescriptor>, SessionError> {
        self.list_all::<ResourceTemplatesPage>(
            "resource templates",
            RequestFromClient::ListResourceTemplatesRequest,
        )
        .await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, SessionError> {
        debug!(tool = %name, argument_count = arguments.len(), "Calling MCP tool");
        let params = CallToolRequestParams::new(name).with_arguments(arguments);
        self.call(RequestFromClient::CallToolRequest(params)).await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, SessionError> {
        debug!(uri = %uri, "Reading MCP resource");
        let params = ReadResourceRequestParams {
            meta: None,
            uri: uri.to_string(),
        };
        let value = self
            .call(RequestFromClient::ReadResourceRequest(params))
            .await?;
        serde_json::from_value::<ReadResourcePayload>(value)
            .map(|payload| payload.contents)
            .map_err(|err| SessionError::InvocationRejected(format!("Malformed MCP result: {err}")))
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptTranscript, SessionError> {
        debug!(prompt = %name, argument_count = arguments.len(), "Fetching MCP prompt");
        let params = GetPromptRequestParams {
            name: name.to_string(),
            arguments: (!arguments.is_empty()).then(|| {
                arguments
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<HashMap<_, _>>()
            }),
            meta: None,
        };
        let value = self
            .call(RequestFromClient::GetPromptRequest(params))
            .await?;
        serde_json::from_value::<PromptTranscript>(value)
            .map_err(|err| SessionError::InvocationRejected(format!("Malformed MCP result: {err}")))
    }
}
