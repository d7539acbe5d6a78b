//! Failure taxonomy shared by the session, the peer client, and the backend.
//!
//! Only [`SessionError::PeerUnavailable`] raised while connecting ends a
//! session; every other variant is reported to the operator and the menu
//! loop continues.

use crate::ui::operator::OperatorError;
use std::error::Error as StdError;
use std::fmt;

/// Capability families the registry can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tool,
    Prompt,
    Resource,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Prompt => "prompt",
            CapabilityKind::Resource => "resource",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The peer could not be reached, or the channel broke underneath a call.
    PeerUnavailable(String),
    /// The peer answered a call with an error.
    InvocationRejected(String),
    /// A selection did not match anything discovered at connect time.
    CapabilityNotFound { kind: CapabilityKind, name: String },
    /// The generative backend failed or returned nothing usable.
    GenerationFailure(String),
    /// Reading operator input failed.
    Operator(OperatorError),
}

impl SessionError {
    pub fn not_found(kind: CapabilityKind, name: impl Into<String>) -> Self {
        SessionError::CapabilityNotFound {
            kind,
            name: name.into(),
        }
    }

    /// True when the operator's input stream has ended.
    pub fn is_input_closed(&self) -> bool {
        matches!(self, SessionError::Operator(OperatorError::Closed))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::PeerUnavailable(message) => {
                write!(f, "MCP server unavailable: {message}")
            }
            SessionError::InvocationRejected(message) => write!(f, "{message}"),
            SessionError::CapabilityNotFound { kind, name } => {
                write!(f, "No {kind} named '{name}' was discovered on this server.")
            }
            SessionError::GenerationFailure(message) => {
                write!(f, "Generation failed: {message}")
            }
            SessionError::Operator(err) => write!(f, "Input error: {err}"),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Operator(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OperatorError> for SessionError {
    fn from(err: OperatorError) -> Self {
        SessionError::Operator(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_not_found_names_kind_and_selection() {
        let err = SessionError::not_found(CapabilityKind::Prompt, "summarize");
        assert_eq!(
            err.to_string(),
            "No prompt named 'summarize' was discovered on this server."
        );
    }

    #[test]
    fn closed_input_is_detected_through_conversion() {
        let err: SessionError = OperatorError::Closed.into();
        assert!(err.is_input_closed());
        assert!(!SessionError::InvocationRejected("boom".into()).is_input_closed());
    }
}
