//! CaseGuard error types

use thiserror::Error;

/// CaseGuard error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required resource (document root, index snapshot, data file) is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// A payload violated a structural invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tool dispatch error
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Vector index error
    #[error("Index error: {0}")]
    Index(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Terminal outcome of a single tool call.
///
/// Every variant is final for the call that produced it. Transient handler
/// failures are retried inside the registry and only reach the caller as
/// `RetriesExhausted`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// No tool registered under this name
    #[error("Unknown tool: {tool}")]
    NotFound { tool: String },

    /// The caller's role is not in the tool's allowed set
    #[error("Role '{role}' cannot call tool '{tool}'")]
    PermissionDenied { role: String, tool: String },

    /// Caller-supplied payload failed the input schema
    #[error("Invalid input for '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },

    /// Handler produced output that failed the output schema
    #[error("Invalid output from '{tool}': {reason}")]
    InvalidOutput { tool: String, reason: String },

    /// Handler reported a permanent failure
    #[error("Tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },

    /// Transient failures persisted through every allowed attempt
    #[error("Tool '{tool}' failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        tool: String,
        attempts: u32,
        last_error: String,
    },

    /// The overall per-call deadline elapsed
    #[error("Tool '{tool}' exceeded its {deadline_ms}ms deadline")]
    DeadlineExceeded { tool: String, deadline_ms: u64 },
}

impl ToolError {
    /// Stable code used in audit events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidOutput { .. } => "INVALID_OUTPUT",
            Self::Failed { .. } => "FAILED",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
        }
    }
}

/// Result type alias for CaseGuard operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_wraps_into_error() {
        let err: Error = ToolError::PermissionDenied {
            role: "context_policy".to_string(),
            tool: "issue_refund".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Tool(ToolError::PermissionDenied { .. })));
        assert_eq!(
            err.to_string(),
            "Tool error: Role 'context_policy' cannot call tool 'issue_refund'"
        );
    }

    #[test]
    fn test_tool_error_codes_are_distinct() {
        let timeout = ToolError::DeadlineExceeded {
            tool: "t".to_string(),
            deadline_ms: 10,
        };
        let exhausted = ToolError::RetriesExhausted {
            tool: "t".to_string(),
            attempts: 3,
            last_error: "io".to_string(),
        };
        assert_ne!(timeout.code(), exhausted.code());
    }
}
