use rust_mcp_schema::schema_utils::ServerJsonrpcRequest;

/// A request the server sent to us, forwarded off the stdout reader task.
#[derive(Debug, Clone)]
pub struct McpServerRequest {
    pub server_id: String,
    pub request: ServerJsonrpcRequest,
}
