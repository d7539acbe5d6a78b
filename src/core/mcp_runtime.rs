//! Background task that answers requests the server sends while the
//! session is running.

use crate::core::sampling::SamplingBridge;
use crate::mcp::client::client_capabilities;
use crate::mcp::events::McpServerRequest;
use crate::mcp::peer::Responder;
use rust_mcp_schema::schema_utils::{ResultFromClient, ServerJsonrpcRequest};
use rust_mcp_schema::{RequestId, Result as EmptyResult, RpcError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct SamplingService {
    bridge: Arc<SamplingBridge>,
    responder: Arc<dyn Responder>,
}

impl SamplingService {
    pub fn new(bridge: Arc<SamplingBridge>, responder: Arc<dyn Responder>) -> Self {
        Self { bridge, responder }
    }

    /// Serves requests one at a time until the channel closes or the token
    /// is cancelled.
    pub fn spawn(
        self,
        mut requests: mpsc::UnboundedReceiver<McpServerRequest>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = requests.recv() => match request {
                        Some(request) => request,
                        None => break,
                    },
                };
                self.handle_server_request(request).await;
            }
            debug!("Sampling service stopped");
        })
    }

    pub async fn handle_server_request(&self, request: McpServerRequest) {
        let server_id = request.server_id;
        let request_id = request.request.request_id().clone();
        debug!(
            server_id = %server_id,
            request_id = ?request_id,
            method = %request.request.method(),
            "Handling MCP server request"
        );

        if let Err(err) = client_capabilities().can_handle_request(&request.request) {
            self.reply_error(&server_id, request_id, err).await;
            return;
        }

        if let ServerJsonrpcRequest::PingRequest(ping) = &request.request {
            if let Err(err) = self
                .responder
                .send_result(ping.id.clone(), ResultFromClient::Result(EmptyResult::default()))
                .await
            {
                warn!(server_id = %server_id, error = %err, "Failed to answer MCP ping");
            }
            return;
        }

        let ServerJsonrpcRequest::CreateMessageRequest(create_request) = request.request else {
            self.reply_error(
                &server_id,
                request_id,
                RpcError::method_not_found().with_message("Unsupported MCP request from server."),
            )
            .await;
            return;
        };

        let result = self.bridge.handle(&create_request).await;
        if let Err(err) = self
            .responder
            .send_result(
                create_request.id.clone(),
                ResultFromClient::CreateMessageResult(result),
            )
            .await
        {
            warn!(
                server_id = %server_id,
                request_id = ?create_request.id,
                error = %err,
                "Failed to send MCP sampling result"
            );
        }
    }

    async fn reply_error(&self, server_id: &str, request_id: RequestId, error: RpcError) {
        debug!(
            server_id = %server_id,
            request_id = ?request_id,
            code = error.code,
            "Rejecting MCP server request"
        );
        if let Err(err) = self.responder.send_error(request_id, error).await {
            warn!(server_id = %server_id, error = %err, "Failed to send MCP error reply");
        }
    }
}
