//! In-memory stand-ins for the operator, the server, and the backend.

use crate::core::backend::{Generation, GenerationRequest, GenerativeBackend};
use crate::core::error::SessionError;
use crate::mcp::capabilities::{
    PromptDescriptor, PromptTranscript, ResourceContent, ResourceDescriptor,
    ResourceTemplateDescriptor, ToolDescriptor,
};
use crate::mcp::peer::{Peer, Responder};
use crate::ui::operator::{Operator, OperatorError};
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::ResultFromClient;
use rust_mcp_schema::{RequestId, RpcError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Select(usize),
    Text(String),
    Confirm(bool),
}

impl Answer {
    pub fn text(value: &str) -> Self {
        Answer::Text(value.to_string())
    }
}

/// Replays canned answers and records every prompt and every shown line.
/// Running out of answers reports closed input.
#[derive(Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<Answer>>,
    prompts: Mutex<Vec<String>>,
    shown: Mutex<Vec<String>>,
    reviewed: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    /// Texts shown through `review`, together with their question.
    pub fn reviewed(&self) -> Vec<String> {
        self.reviewed.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str) -> Result<Answer, OperatorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OperatorError::Closed)
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn select(&self, message: &str, choices: &[String]) -> Result<usize, OperatorError> {
        match self.next(message)? {
            Answer::Select(index) if index < choices.len() => Ok(index),
            other => panic!("unexpected answer {other:?} for select '{message}' over {choices:?}"),
        }
    }

    async fn input(&self, message: &str) -> Result<String, OperatorError> {
        match self.next(message)? {
            Answer::Text(text) => Ok(text),
            other => panic!("unexpected answer {other:?} for input '{message}'"),
        }
    }

    async fn confirm(&self, message: &str, _default: bool) -> Result<bool, OperatorError> {
        match self.next(message)? {
            Answer::Confirm(value) => Ok(value),
            other => panic!("unexpected answer {other:?} for confirm '{message}'"),
        }
    }

    fn show(&self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }

    async fn review(&self, text: &str, question: &str, default: bool) -> Result<bool, OperatorError> {
        self.reviewed.lock().unwrap().push(text.to_string());
        self.show(text);
        self.confirm(question, default).await
    }
}

/// A server with fixed capabilities and canned invocation results.
#[derive(Default)]
pub struct FakePeer {
    pub tools: Vec<ToolDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub resource_templates: Vec<ResourceTemplateDescriptor>,
    pub tool_results: HashMap<String, Result<Value, SessionError>>,
    pub resource_contents: HashMap<String, Vec<ResourceContent>>,
    pub prompt_transcripts: HashMap<String, PromptTranscript>,
    pub fail_listing: Option<SessionError>,
    pub tool_calls: Mutex<Vec<(String, Map<String, Value>)>>,
    pub resource_reads: Mutex<Vec<String>>,
    pub prompt_requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    pub list_calls: AtomicUsize,
}

impl FakePeer {
    pub fn recorded_tool_calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.tool_calls.lock().unwrap().clone()
    }

    fn listing<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, SessionError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_listing {
            Some(err) => Err(err.clone()),
            None => Ok(items.to_vec()),
        }
    }
}

#[async_trait]
impl Peer for FakePeer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        self.listing(&self.tools)
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, SessionError> {
        self.listing(&self.prompts)
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, SessionError> {
        self.listing(&self.resources)
    }

    async fn list_resource_templates(
        &self,
    ) -> Result<Vec<ResourceTemplateDescriptor>, SessionError> {
        self.listing(&self.resource_templates)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, SessionError> {
        self.tool_calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.tool_results.get(name).cloned().unwrap_or_else(|| {
            Err(SessionError::InvocationRejected(format!(
                "MCP error -32602: Unknown tool: {name}"
            )))
        })
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, SessionError> {
        self.resource_reads.lock().unwrap().push(uri.to_string());
        self.resource_contents.get(uri).cloned().ok_or_else(|| {
            SessionError::InvocationRejected(format!("MCP error -32002: Resource not found: {uri}"))
        })
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<PromptTranscript, SessionError> {
        self.prompt_requests
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        self.prompt_transcripts.get(name).cloned().ok_or_else(|| {
            SessionError::InvocationRejected(format!("MCP error -32602: Unknown prompt: {name}"))
        })
    }
}

/// Returns queued generations in order and records each request.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<Generation, SessionError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<Generation, SessionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|text| Ok(text_generation(text)))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn text_generation(text: &str) -> Generation {
    Generation {
        text: Some(text.to_string()),
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn complete(&self, request: GenerationRequest) -> Result<Generation, SessionError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::GenerationFailure("no scripted reply".into())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(RequestId, Value),
    Error(RequestId, i64, String),
}

/// Captures replies to server-initiated requests.
#[derive(Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<Reply>>,
}

impl RecordingResponder {
    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn send_result(
        &self,
        request_id: RequestId,
        result: ResultFromClient,
    ) -> Result<(), String> {
        let value = serde_json::to_value(&result).map_err(|err| err.to_string())?;
        self.replies
            .lock()
            .unwrap()
            .push(Reply::Result(request_id, value));
        Ok(())
    }

    async fn send_error(&self, request_id: RequestId, error: RpcError) -> Result<(), String> {
        self.replies
            .lock()
            .unwrap()
            .push(Reply::Error(request_id, error.code, error.message));
        Ok(())
    }
}

pub fn tool(name: &str, schema: Value) -> ToolDescriptor {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "description": format!("{name} tool"),
        "inputSchema": schema
    }))
    .expect("tool descriptor")
}
