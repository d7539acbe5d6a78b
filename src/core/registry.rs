//! Everything the server offered at connect time. Read-only afterwards.

use crate::core::error::{CapabilityKind, SessionError};
use crate::mcp::capabilities::{
    PromptDescriptor, ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor,
};
use crate::mcp::peer::Peer;
use futures_util::future::try_join4;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityRegistry {
    tools: Vec<ToolDescriptor>,
    prompts: Vec<PromptDescriptor>,
    resources: Vec<ResourceDescriptor>,
    resource_templates: Vec<ResourceTemplateDescriptor>,
}

impl CapabilityRegistry {
    pub fn new(
        tools: Vec<ToolDescriptor>,
        prompts: Vec<PromptDescriptor>,
        resources: Vec<ResourceDescriptor>,
        resource_templates: Vec<ResourceTemplateDescriptor>,
    ) -> Self {
        Self {
            tools,
            prompts,
            resources,
            resource_templates,
        }
    }

    /// Issues the four list calls concurrently. Any failure is fatal for the
    /// session and is not retried.
    pub async fn discover(peer: &dyn Peer) -> Result<Self, SessionError> {
        let (tools, prompts, resources, resource_templates) = try_join4(
            peer.list_tools(),
            peer.list_prompts(),
            peer.list_resources(),
            peer.list_resource_templates(),
        )
        .await
        .map_err(|err| match err {
            SessionError::PeerUnavailable(message) => SessionError::PeerUnavailable(message),
            other => SessionError::PeerUnavailable(format!("capability discovery failed: {other}")),
        })?;

        debug!(
            tools = tools.len(),
            prompts = prompts.len(),
            resources = resources.len(),
            resource_templates = resource_templates.len(),
            "Capabilities discovered"
        );
        Ok(Self::new(tools, prompts, resources, resource_templates))
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn resource_templates(&self) -> &[ResourceTemplateDescriptor] {
        &self.resource_templates
    }

    pub fn tool(&self, name: &str) -> Result<&ToolDescriptor, SessionError> {
        self.tools
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| SessionError::not_found(CapabilityKind::Tool, name))
    }

    pub fn prompt(&self, name: &str) -> Result<&PromptDescriptor, SessionError> {
        self.prompts
            .iter()
            .find(|prompt| prompt.name == name)
            .ok_or_else(|| SessionError::not_found(CapabilityKind::Prompt, name))
    }

    pub fn resource(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|resource| resource.uri == uri)
    }

    pub fn resource_template(&self, pattern: &str) -> Option<&ResourceTemplateDescriptor> {
        self.resource_templates
            .iter()
            .find(|template| template.uri_template == pattern)
    }

    /// Human-readable listing, one capability per line.
    pub fn render(&self) -> String {
        fn describe(label: &str, description: Option<&str>) -> String {
            match description.filter(|d| !d.trim().is_empty()) {
                Some(description) => format!("  - {label}: {description}"),
                None => format!("  - {label}"),
            }
        }

        let mut lines = Vec::new();
        lines.push(format!("Tools ({}):", self.tools.len()));
        for tool in &self.tools {
            lines.push(describe(&tool.name, tool.description.as_deref()));
        }
        lines.push(format!("Prompts ({}):", self.prompts.len()));
        for prompt in &self.prompts {
            lines.push(describe(&prompt.name, prompt.description.as_deref()));
        }
        lines.push(format!("Resources ({}):", self.resources.len()));
        for resource in &self.resources {
            lines.push(describe(
                &format!("{} ({})", resource.name, resource.uri),
                resource.description.as_deref(),
            ));
        }
        lines.push(format!(
            "Resource templates ({}):",
            self.resource_templates.len()
        ));
        for template in &self.resource_templates {
            lines.push(describe(
                &format!("{} ({})", template.name, template.uri_template),
                template.description.as_deref(),
            ));
        }
        lines.join("\n")
    }
}
