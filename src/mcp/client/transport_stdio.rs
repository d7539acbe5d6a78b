//! Newline-delimited JSON-RPC over a child process's stdio.
//!
//! One reader task owns stdout. Responses are matched to their callers
//! through the pending map; requests the server initiates are forwarded on
//! the request channel so they can be served while our own calls are still
//! waiting.

use super::protocol::{decode_incoming, Incoming, ResponseEnvelope};
use crate::core::config::data::ServerConfig;
use crate::mcp::events::McpServerRequest;
use crate::mcp::peer::Responder;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ResultFromClient, ServerMessage,
};
use rust_mcp_schema::{RequestId, RpcError};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default wait for a response when the config does not set one.
pub const STDIO_REQUEST_TIMEOUT_SECONDS: u64 = 60;
/// Applied while a server request is in flight; those usually wait on a
/// person answering a confirmation.
const STDIO_SAMPLING_TIMEOUT_MULTIPLIER: u64 = 10;
const STDIO_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseEnvelope>>>>;

pub struct StdioClient {
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_request_id: AtomicI64,
    server_id: String,
    request_timeout: Duration,
    activity_notify: Arc<Notify>,
    inflight_server_requests: Arc<AtomicI64>,
    shutdown: CancellationToken,
}

pub(crate) fn require_stdio_command(config: &ServerConfig) -> Result<String, String> {
    config
        .command
        .clone()
        .filter(|command| !command.trim().is_empty())
        .ok_or_else(|| "An MCP server command is required (use --server or [server].command).".to_string())
}

/// Decrements without going below zero and returns the new count.
fn release_inflight(counter: &AtomicI64) -> i64 {
    let mut current = counter.load(Ordering::SeqCst);
    while current > 0 {
        match counter.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return current - 1,
            Err(next) => current = next,
        }
    }
    current
}

impl StdioClient {
    pub async fn connect(
        server_id: String,
        config: &ServerConfig,
        request_tx: Option<mpsc::UnboundedSender<McpServerRequest>>,
    ) -> Result<Arc<Self>, String> {
        let command = require_stdio_command(config)?;
        debug!(server_id = %server_id, command = %command, args = ?config.args, "Starting MCP stdio server");
        let mut cmd = Command::new(&command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| format!("Failed to start '{command}': {err}"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| "Unable to retrieve stdin.".to_string())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Unable to retrieve stdout.".to_string())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| "Unable to retrieve stderr.".to_string())?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let client = Arc::new(Self {
            stdin: Mutex::new(stdin),
            pending: pending.clone(),
            next_request_id: AtomicI64::new(0),
            server_id,
            request_timeout: Duration::from_secs(
                config
                    .request_timeout_secs
                    .unwrap_or(STDIO_REQUEST_TIMEOUT_SECONDS),
            ),
            activity_notify: Arc::new(Notify::new()),
            inflight_server_requests: Arc::new(AtomicI64::new(0)),
            shutdown: CancellationToken::new(),
        });

        client.spawn_stdout_reader(stdout, request_tx);
        Self::spawn_stderr_drain(client.server_id.clone(), stderr);

        let shutdown = client.shutdown.clone();
        let server_id = client.server_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    debug!(server_id = %server_id, status = ?status, "MCP stdio server exited");
                }
                _ = shutdown.cancelled() => {
                    if let Err(err) = child.kill().await {
                        warn!(server_id = %server_id, error = %err, "Failed to stop MCP stdio server");
                    }
                }
            }
            // Dropping the senders wakes every waiting caller.
            pending.lock().await.clear();
        });

        Ok(client)
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Stops the child process. Outstanding calls fail with a closed channel.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn spawn_stdout_reader(
        &self,
        stdout: ChildStdout,
        request_tx: Option<mpsc::UnboundedSender<McpServerRequest>>,
    ) {
        let pending = self.pending.clone();
        let server_id = self.server_id.clone();
        let activity_notify = self.activity_notify.clone();
        let inflight = self.inflight_server_requests.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let value = match serde_json::from_str::<Value>(&line) {
                    Ok(value) => value,
                    Err(_) => {
                        debug!(server_id = %server_id, line = %line, "Ignoring non-JSON stdout line");
                        continue;
                    }
                };
                let items = match value {
                    Value::Array(items) => items,
                    single => vec![single],
                };
                for item in items {
                    match decode_incoming(item) {
                        Ok(incoming) => {
                            Self::dispatch(
                                &pending,
                                incoming,
                                &server_id,
                                request_tx.as_ref(),
                                &activity_notify,
                                &inflight,
                            )
                            .await
                        }
                        Err(err) => {
                            debug!(server_id = %server_id, error = %err, "Dropping undecodable MCP message")
                        }
                    }
                }
            }
            debug!(server_id = %server_id, "MCP stdio stdout closed");
        });
    }

    fn spawn_stderr_drain(server_id: String, stderr: ChildStderr) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(server_id = %server_id, line = %line, "MCP server stderr");
            }
        });
    }

    async fn dispatch(
        pending: &PendingMap,
        incoming: Incoming,
        server_id: &str,
        request_tx: Option<&mpsc::UnboundedSender<McpServerRequest>>,
        activity_notify: &Notify,
        inflight_server_requests: &AtomicI64,
    ) {
        match incoming {
            Incoming::Response(response) => {
                debug!(
                    server_id = %server_id,
                    response_id = ?response.id,
                    is_error = response.outcome.is_err(),
                    "Received MCP stdio response"
                );
                match pending.lock().await.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => {
                        debug!(server_id = %server_id, response_id = ?response.id, "No caller waiting for response")
                    }
                }
            }
            Incoming::Message(ServerMessage::Request(request)) => {
                let method = request.method().to_string();
                let request_id = request.request_id().clone();
                activity_notify.notify_waiters();
                let forwarded = request_tx.is_some_and(|tx| {
                    tx.send(McpServerRequest {
                        server_id: server_id.to_string(),
                        request,
                    })
                    .is_ok()
                });
                if forwarded {
                    let inflight = inflight_server_requests.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(
                        server_id = %server_id,
                        method = %method,
                        request_id = ?request_id,
                        inflight_server_requests = inflight,
                        "Received MCP stdio request"
                    );
                } else {
                    warn!(
                        server_id = %server_id,
                        method = %method,
                        request_id = ?request_id,
                        "No handler for MCP server request"
                    );
                }
            }
            Incoming::Message(ServerMessage::Notification(_)) => {
                debug!(server_id = %server_id, "Received MCP stdio notification");
                activity_notify.notify_waiters();
            }
            Incoming::Message(other) => {
                debug!(server_id = %server_id, message = ?other, "Unexpected MCP stdio message");
            }
        }
    }

    fn timeout_for_wait(&self) -> Duration {
        let multiplier = if self.inflight_server_requests.load(Ordering::SeqCst) > 0 {
            STDIO_SAMPLING_TIMEOUT_MULTIPLIER as u32
        } else {
            1
        };
        self.request_timeout * multiplier
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Integer(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Sends a request and waits for the matching response. The deadline is
    /// pushed back whenever the server shows signs of life.
    pub async fn send_request(&self, request: RequestFromClient) -> Result<ResponseEnvelope, String> {
        let request_id = self.next_request_id();
        debug!(server_id = %self.server_id, request_id = ?request_id, "Sending MCP stdio request");
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| err.to_string())?;

        let (tx, mut rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(err) = self.write_message(&message).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        let mut timeout = self.timeout_for_wait();
        let mut deadline = tokio::time::Instant::now() + timeout;
        loop {
            tokio::select! {
                result = &mut rx => {
                    return result.map_err(|_| {
                        debug!(request_id = ?request_id, "MCP stdio response channel closed");
                        "MCP stdio response channel closed.".to_string()
                    });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.pending.lock().await.remove(&request_id);
                    debug!(
                        request_id = ?request_id,
                        timeout_secs = timeout.as_secs(),
                        "MCP stdio request timed out"
                    );
                    return Err("MCP stdio request timed out.".to_string());
                }
                _ = self.activity_notify.notified() => {
                    timeout = self.timeout_for_wait();
                    deadline = tokio::time::Instant::now() + timeout;
                    debug!(
                        request_id = ?request_id,
                        timeout_secs = timeout.as_secs(),
                        inflight_server_requests = self.inflight_server_requests.load(Ordering::SeqCst),
                        "MCP stdio timeout reset after server activity"
                    );
                }
            }
        }
    }

    pub async fn send_notification(&self, notification: NotificationFromClient) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;
        self.write_message(&message).await
    }

    async fn reply(
        &self,
        request_id: &RequestId,
        message: Result<ClientMessage, RpcError>,
    ) -> Result<(), String> {
        let outcome = match message {
            Ok(message) => self.write_message(&message).await,
            Err(err) => Err(err.to_string()),
        };
        self.finish_server_request(request_id, outcome).await
    }

    /// The server request is finished once a reply was attempted, whether or
    /// not the write went through.
    async fn finish_server_request(&self, request_id: &RequestId, result: Result<(), String>) -> Result<(), String> {
        let inflight = release_inflight(&self.inflight_server_requests);
        match &result {
            Ok(()) => debug!(
                server_id = %self.server_id,
                request_id = ?request_id,
                inflight_server_requests = inflight,
                "Answered MCP server request"
            ),
            Err(err) => warn!(
                server_id = %self.server_id,
                request_id = ?request_id,
                inflight_server_requests = inflight,
                error = %err,
                "Failed to answer MCP server request"
            ),
        }
        self.activity_notify.notify_waiters();
        result
    }

    /// Writes one message followed by a newline, bounded by the write timeout.
    async fn write_message(&self, message: &ClientMessage) -> Result<(), String> {
        let mut payload = serde_json::to_vec(message).map_err(|err| err.to_string())?;
        payload.push(b'\n');

        let mut stdin = tokio::time::timeout(STDIO_WRITE_TIMEOUT, self.stdin.lock())
            .await
            .map_err(|_| "Timed out waiting for MCP stdio stdin lock.".to_string())?;
        debug!(server_id = %self.server_id, bytes = payload.len(), "Writing MCP stdio message");
        tokio::time::timeout(STDIO_WRITE_TIMEOUT, async {
            stdin.write_all(&payload).await?;
            stdin.flush().await
        })
        .await
        .map_err(|_| "Timed out writing MCP stdio message.".to_string())?
        .map_err(|err| format!("MCP stdio write failed: {err}"))
    }
}

#[async_trait]
impl Responder for StdioClient {
    async fn send_result(&self, request_id: RequestId, result: ResultFromClient) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::ResultFromClient(result),
            Some(request_id.clone()),
        );
        self.reply(&request_id, message).await
    }

    async fn send_error(&self, request_id: RequestId, error: RpcError) -> Result<(), String> {
        let message =
            ClientMessage::from_message(MessageFromClient::Error(error), Some(request_id.clone()));
        self.reply(&request_id, message).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mcp::client::protocol::parse_response_value;
    use serde_json::json;

    fn shell_server(script: &str) -> ServerConfig {
        ServerConfig {
            command: Some("sh".to_string()),
            args: vec!["-c".to_string(), script.to_string()],
            request_timeout_secs: Some(5),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn response_is_routed_to_the_waiting_caller() {
        // Answers the first request (id 0) with a fixed result.
        let config = shell_server(
            r#"read line; echo '{"jsonrpc":"2.0","id":0,"result":{"ok":true}}'; sleep 1"#,
        );
        let client = StdioClient::connect("test".to_string(), &config, None)
            .await
            .expect("spawn sh");

        let response = client
            .send_request(RequestFromClient::PingRequest(None))
            .await
            .expect("response");
        assert_eq!(response.id, RequestId::Integer(0));
        assert_eq!(parse_response_value(response).expect("result"), json!({"ok": true}));
        client.shutdown();
    }

    #[tokio::test]
    async fn server_requests_are_forwarded_while_a_call_is_pending() {
        let config = shell_server(concat!(
            "read line; ",
            r#"echo '{"jsonrpc":"2.0","id":"s1","method":"sampling/createMessage","params":{"messages":[],"maxTokens":8}}'; "#,
            "read reply; ",
            r#"echo '{"jsonrpc":"2.0","id":0,"result":{}}'; sleep 1"#
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = StdioClient::connect("test".to_string(), &config, Some(tx))
            .await
            .expect("spawn sh");

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.send_request(RequestFromClient::PingRequest(None)).await })
        };

        let inbound = rx.recv().await.expect("forwarded request");
        assert_eq!(inbound.server_id, "test");
        assert_eq!(inbound.request.method(), "sampling/createMessage");
        client
            .send_error(
                inbound.request.request_id().clone(),
                RpcError::method_not_found().with_message("not here"),
            )
            .await
            .expect("reply written");

        let response = caller.await.expect("join").expect("response");
        assert_eq!(response.id, RequestId::Integer(0));
        client.shutdown();
    }

    #[tokio::test]
    async fn exited_server_fails_pending_calls() {
        let config = shell_server("read line; exit 0");
        let client = StdioClient::connect("test".to_string(), &config, None)
            .await
            .expect("spawn sh");

        let err = client
            .send_request(RequestFromClient::PingRequest(None))
            .await
            .expect_err("server exited");
        assert_eq!(err, "MCP stdio response channel closed.");
    }

    #[tokio::test]
    async fn unforwarded_server_requests_are_not_counted() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let notify = Notify::new();
        let inflight = AtomicI64::new(0);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        for request_tx in [None, Some(&tx)] {
            let incoming = decode_incoming(json!({"jsonrpc":"2.0","id":3,"method":"ping"}))
                .expect("decode");
            StdioClient::dispatch(&pending, incoming, "test", request_tx, &notify, &inflight).await;
        }
        assert_eq!(inflight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_reply_still_releases_the_server_request() {
        let config = shell_server(r#"echo '{"jsonrpc":"2.0","id":"s1","method":"ping"}'; exit 0"#);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = StdioClient::connect("test".to_string(), &config, Some(tx))
            .await
            .expect("spawn sh");

        let inbound = rx.recv().await.expect("forwarded request");
        assert_eq!(client.inflight_server_requests.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // The child is gone, so the write may fail; the request is released either way.
        let _ = client
            .send_error(
                inbound.request.request_id().clone(),
                RpcError::method_not_found().with_message("gone"),
            )
            .await;
        assert_eq!(client.inflight_server_requests.load(Ordering::SeqCst), 0);
        assert_eq!(client.timeout_for_wait(), Duration::from_secs(5));
    }

    #[test]
    fn missing_command_is_reported() {
        let err = require_stdio_command(&ServerConfig::default()).expect_err("no command");
        assert!(err.contains("--server"));
    }
}
