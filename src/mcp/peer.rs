//! The RPC surface the session consumes, split from the transport so the
//! menu loop, query engine, and sampling service can run against fakes.

use crate::core::error::SessionError;
use crate::mcp::capabilities::{
    PromptDescriptor, PromptTranscript, ResourceContent, ResourceDescriptor,
    ResourceTemplateDescriptor, ToolDescriptor,
};
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::ResultFromClient;
use rust_mcp_schema::{RequestId, RpcError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outbound calls to the server.
///
/// List calls return every page. A server that answers a list call with
/// "method not found" yields an empty list rather than an error.
#[async_trait]
pub trait Peer: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, SessionError>;

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SessionError>;

    async fn list_resource_templates(
        &self,
    ) -> Result<Vec<ResourceTemplateDescriptor>, SessionError>;

    /// Returns the raw `tools/call` result object.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>)
        -> Result<Value, SessionError>;

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, SessionError>;

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptTranscript, SessionError>;
}

/// Replies to requests the server initiated.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send_result(&self, request_id: RequestId, result: ResultFromClient)
        -> Result<(), String>;

    async fn send_error(&self, request_id: RequestId, error: RpcError) -> Result<(), String>;
}
