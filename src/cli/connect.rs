//! Brings up everything a command needs from the server: the client, the
//! sampling service, and the discovered capabilities.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::backend::{ChatCompletionsBackend, GenerativeBackend};
use crate::core::config::Config;
use crate::core::error::SessionError;
use crate::core::mcp_runtime::SamplingService;
use crate::core::registry::CapabilityRegistry;
use crate::core::sampling::SamplingBridge;
use crate::mcp::client::McpClient;
use crate::mcp::peer::Peer;
use crate::ui::operator::Operator;

pub fn build_backend(config: &Config) -> Result<Arc<dyn GenerativeBackend>, SessionError> {
    let backend = ChatCompletionsBackend::from_config(&config.backend)?;
    Ok(Arc::new(backend))
}

/// Short name for the server in logs: the executable's file name.
pub fn server_id(config: &Config) -> String {
    config
        .server
        .command
        .as_deref()
        .and_then(|command| Path::new(command).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "server".to_string())
}

pub struct ConnectedServer {
    client: Arc<McpClient>,
    registry: Arc<CapabilityRegistry>,
    bridge: Arc<SamplingBridge>,
    cancel: CancellationToken,
    service: JoinHandle<()>,
}

impl ConnectedServer {
    /// Connects, starts serving sampling requests, then runs discovery so
    /// a server that samples while listing is already answered.
    pub async fn start(
        config: &Config,
        backend: Arc<dyn GenerativeBackend>,
        operator: Arc<dyn Operator>,
    ) -> Result<Self, SessionError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let client =
            Arc::new(McpClient::connect(server_id(config), &config.server, request_tx).await?);

        let bridge = Arc::new(SamplingBridge::new(
            backend,
            operator,
            config.backend.sampling_model(),
        ));
        let cancel = CancellationToken::new();
        let service = SamplingService::new(bridge.clone(), client.responder())
            .spawn(request_rx, cancel.clone());

        let server = Self {
            client,
            registry: Arc::new(CapabilityRegistry::default()),
            bridge,
            cancel,
            service,
        };
        match CapabilityRegistry::discover(server.client.as_ref()).await {
            Ok(registry) => Ok(Self {
                registry: Arc::new(registry),
                ..server
            }),
            Err(err) => {
                server.shutdown().await;
                Err(err)
            }
        }
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    pub fn peer(&self) -> Arc<dyn Peer> {
        self.client.clone()
    }

    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        self.registry.clone()
    }

    pub fn bridge(&self) -> Arc<SamplingBridge> {
        self.bridge.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.client.shutdown();
        if let Err(err) = self.service.await {
            debug!(error = %err, "Sampling service ended abnormally");
        }
    }
}
