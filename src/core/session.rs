//! The interactive menu loop.
//!
//! Every iteration starts from the top-level menu and is independent of the
//! ones before it. Failures inside an iteration are shown to the operator
//! and the loop carries on; only the end of input (or `Quit`) stops it.

use crate::core::collector::collect;
use crate::core::error::SessionError;
use crate::core::query::QueryEngine;
use crate::core::registry::CapabilityRegistry;
use crate::core::sampling::SamplingBridge;
use crate::core::uri_template;
use crate::mcp::capabilities::{first_text_content, is_error_result, string_arguments};
use crate::mcp::peer::Peer;
use crate::ui::operator::{Operator, OperatorError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAIN_MENU_PROMPT: &str = "What would you like to do?";
pub const QUERY_PROMPT: &str = "Enter your query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Query,
    Tools,
    Resources,
    Prompts,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Query,
        MenuAction::Tools,
        MenuAction::Resources,
        MenuAction::Prompts,
        MenuAction::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Query => "Query",
            MenuAction::Tools => "Tools",
            MenuAction::Resources => "Resources",
            MenuAction::Prompts => "Prompts",
            MenuAction::Quit => "Quit",
        }
    }
}

fn choice_label(label: &str, description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(description) => format!("{label} - {description}"),
        None => label.to_string(),
    }
}

/// What the operator sees for a `tools/call` result.
pub fn render_tool_result(result: &Value) -> String {
    let body = first_text_content(result)
        .map(str::to_string)
        .unwrap_or_else(|| "The tool returned no text content.".to_string());
    if is_error_result(result) {
        format!("Tool error: {body}")
    } else {
        body
    }
}

/// Resource text, re-indented when it is JSON.
pub fn render_resource_text(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
        }
        _ => text.to_string(),
    }
}

pub struct Session {
    peer: Arc<dyn Peer>,
    registry: Arc<CapabilityRegistry>,
    operator: Arc<dyn Operator>,
    bridge: Arc<SamplingBridge>,
    engine: QueryEngine,
}

impl Session {
    pub fn new(
        peer: Arc<dyn Peer>,
        registry: Arc<CapabilityRegistry>,
        operator: Arc<dyn Operator>,
        bridge: Arc<SamplingBridge>,
        engine: QueryEngine,
    ) -> Self {
        Self {
            peer,
            registry,
            operator,
            bridge,
            engine,
        }
    }

    /// Runs until the operator quits or input ends. An unreadable terminal
    /// is the only error returned.
    pub async fn run(&self) -> Result<(), SessionError> {
        loop {
            match self.run_once().await {
                Ok(MenuAction::Quit) => return Ok(()),
                Ok(_) => {}
                Err(err) if err.is_input_closed() => {
                    debug!("Operator input closed; ending session");
                    return Ok(());
                }
                Err(SessionError::Operator(OperatorError::Io(message))) => {
                    return Err(SessionError::Operator(OperatorError::Io(message)));
                }
                Err(err) => {
                    warn!(error = %err, "Menu action failed");
                    self.operator.show(&err.to_string());
                }
            }
        }
    }

    /// One pass through the top-level menu.
    pub async fn run_once(&self) -> Result<MenuAction, SessionError> {
        let labels: Vec<String> = MenuAction::ALL
            .iter()
            .map(|action| action.label().to_string())
            .collect();
        let index = self.operator.select(MAIN_MENU_PROMPT, &labels).await?;
        let action = MenuAction::ALL[index];
        debug!(action = action.label(), "Menu selection");

        match action {
            MenuAction::Query => self.handle_query().await?,
            MenuAction::Tools => self.handle_tools().await?,
            MenuAction::Resources => self.handle_resources().await?,
            MenuAction::Prompts => self.handle_prompts().await?,
            MenuAction::Quit => {}
        }
        Ok(action)
    }

    async fn handle_query(&self) -> Result<(), SessionError> {
        let text = self.operator.input(QUERY_PROMPT).await?;
        let output = self.engine.query(&text, self.registry.tools()).await;
        self.operator.show(&output);
        Ok(())
    }

    async fn handle_tools(&self) -> Result<(), SessionError> {
        let tools = self.registry.tools();
        if tools.is_empty() {
            self.operator.show("This server offers no tools.");
            return Ok(());
        }
        let choices: Vec<String> = tools
            .iter()
            .map(|tool| choice_label(tool.label(), tool.description.as_deref()))
            .collect();
        let index = self.operator.select("Select a tool", &choices).await?;
        let tool = self.registry.tool(&tools[index].name)?;

        let arguments = collect(self.operator.as_ref(), &tool.params()).await?;
        debug!(tool = %tool.name, arguments = arguments.len(), "Calling MCP tool");
        let result = self
            .peer
            .call_tool(&tool.name, string_arguments(&arguments))
            .await?;
        self.operator.show(&render_tool_result(&result));
        Ok(())
    }

    async fn handle_resources(&self) -> Result<(), SessionError> {
        let resources = self.registry.resources();
        let templates = self.registry.resource_templates();
        if resources.is_empty() && templates.is_empty() {
            self.operator.show("This server offers no resources.");
            return Ok(());
        }

        let choices: Vec<String> = resources
            .iter()
            .map(|resource| choice_label(&resource.name, resource.description.as_deref()))
            .chain(
                templates
                    .iter()
                    .map(|template| choice_label(&template.name, template.description.as_deref())),
            )
            .collect();
        let index = self.operator.select("Select a resource", &choices).await?;

        let uri = match resources.get(index) {
            Some(resource) => resource.uri.clone(),
            None => {
                let template = &templates[index - resources.len()];
                uri_template::resolve(self.operator.as_ref(), &template.uri_template).await?
            }
        };

        debug!(uri = %uri, "Reading MCP resource");
        let contents = self.peer.read_resource(&uri).await?;
        let rendered = match contents.first() {
            Some(content) => match (&content.text, &content.blob) {
                (Some(text), _) => render_resource_text(text),
                (None, Some(_)) => format!(
                    "{} is binary ({}); only text resources are shown.",
                    content.uri,
                    content.mime_type.as_deref().unwrap_or("unknown type")
                ),
                (None, None) => format!("{} has no content.", content.uri),
            },
            None => format!("{uri} returned no contents."),
        };
        self.operator.show(&rendered);
        Ok(())
    }

    async fn handle_prompts(&self) -> Result<(), SessionError> {
        let prompts = self.registry.prompts();
        if prompts.is_empty() {
            self.operator.show("This server offers no prompts.");
            return Ok(());
        }
        let choices: Vec<String> = prompts
            .iter()
            .map(|prompt| choice_label(prompt.label(), prompt.description.as_deref()))
            .collect();
        let index = self.operator.select("Select a prompt", &choices).await?;
        let prompt = self.registry.prompt(&prompts[index].name)?;

        let arguments = collect(self.operator.as_ref(), &prompt.params()).await?;
        let transcript = self.peer.get_prompt(&prompt.name, &arguments).await?;
        debug!(
            prompt = %prompt.name,
            messages = transcript.messages.len(),
            "Prompt retrieved"
        );

        for message in &transcript.messages {
            let Some(text) = message.content.as_text() else {
                continue;
            };
            if let Some(output) = self.bridge.run_message(text).await {
                self.operator.show(&output);
            }
        }
        Ok(())
    }
}
