//! Failure taxonomy for sandboxed tool calls.
//!
//! Tools return `Result<String, ToolError>`; the
//! [`ToolSet`](super::core::ToolSet) entry point turns every error into an
//! `is_error` [`ToolResult`](super::core::ToolResult) so nothing escapes the
//! sandbox boundary as a Rust error.

use std::path::PathBuf;

/// Broad class of a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any effect: unknown tool, bad arguments, tool not
    /// permitted under the active stance.
    Validation,
    /// Rejected before any effect: the path escapes the sandbox root.
    Confinement,
    /// Rejected before any effect except the read needed to detect it.
    Precondition,
    /// The effect already happened (or the process could not be driven);
    /// reported as error data.
    Execution,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("tool '{tool}' is not available in stance '{stance}'")]
    NotPermitted { tool: String, stance: String },

    #[error("access denied: '{path}' resolves outside the working directory")]
    AccessDenied { path: String },

    #[error("file not found: '{path}'")]
    NotFound { path: String },

    #[error("'{path}' is a directory, not a file. Use list_dir to browse directories")]
    IsDirectory { path: String },

    #[error("edit target not found in '{path}': old_string does not occur in the file")]
    EditTargetNotFound { path: String },

    #[error(
        "edit rejected as ambiguous: old_string occurs {occurrences} times in '{path}'. \
         Include more surrounding context so it matches exactly once"
    )]
    AmbiguousEdit { path: String, occurrences: usize },

    #[error("command exited with code {code}:\n{output}")]
    CommandFailed { code: i32, output: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} '{}': {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tool '{tool}' timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("internal error in tool '{tool}': {message}")]
    Internal { tool: String, message: String },
}

impl ToolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownTool(_) | Self::InvalidArguments { .. } | Self::NotPermitted { .. } => {
                ErrorCategory::Validation
            }
            Self::AccessDenied { .. } => ErrorCategory::Confinement,
            Self::NotFound { .. }
            | Self::IsDirectory { .. }
            | Self::EditTargetNotFound { .. }
            | Self::AmbiguousEdit { .. } => ErrorCategory::Precondition,
            Self::CommandFailed { .. }
            | Self::Spawn { .. }
            | Self::Io { .. }
            | Self::Timeout { .. }
            | Self::Internal { .. } => ErrorCategory::Execution,
        }
    }

    /// Shorthand for an I/O failure on `path`.
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
