//! The single error type shared by every desk module.

use crate::commit::RequiredField;

/// Errors produced by the registry, the commit flow, the stores and the
/// conversational tester.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// An agent, prompt, version or conversation id did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The model identifier is not part of the configured catalog.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A commit was attempted while required fields were empty.
    #[error("missing required fields: {}", RequiredField::join(.0))]
    Incomplete(Vec<RequiredField>),

    /// A form was submitted with an invalid value.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The tester has no agent selected.
    #[error("no agent selected")]
    NoAgentSelected,

    /// The open conversation already has a reply in flight.
    #[error("a reply is already pending for conversation {0}")]
    ReplyPending(String),

    /// An in-flight reply was cancelled before it resolved.
    #[error("reply cancelled")]
    Cancelled,

    /// The reply backend failed.
    #[error("reply failed: {0}")]
    Reply(String),

    /// Clipboard access failed.
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    /// Filesystem failure, with the operation that failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// (De)serialization failure, with the operation that failed.
    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DeskError {
    /// A missing `kind` with `id`.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// An I/O failure with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// A (de)serialization failure with context.
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T, E = DeskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = DeskError::not_found("agent", "ag-1");
        assert_eq!(err.to_string(), "agent not found: ag-1");
    }

    #[test]
    fn incomplete_lists_fields() {
        let err = DeskError::Incomplete(vec![RequiredField::Title, RequiredField::ChangeDescription]);
        assert_eq!(
            err.to_string(),
            "missing required fields: title, change description"
        );
    }
}
