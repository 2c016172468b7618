//! Convenience re-exports for common `tiller` types.
//!
//! Meant to be glob-imported by the agent loop:
//!
//! ```ignore
//! use tiller::prelude::*;
//! ```
//!
//! This pulls in what a loop needs each turn: the [`Session`], the stance
//! types, the [`ToolSet`] with its results and errors, and the
//! [`SandboxConfig`]. Tracker internals and the individual tool structs stay
//! in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::config::SandboxConfig;
pub use crate::{ToolDef, json_schema_for};

// ── Session ─────────────────────────────────────────────────────────
pub use crate::session::{Escalation, LoopState, RepeatNotice, Session, ShiftOutcome};

// ── Stances ─────────────────────────────────────────────────────────
pub use crate::stance::{
    AllowedTools, ShiftSignal, Stance, StanceConfig, StanceTransition, ToolSelection, get_stance,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::spec::ToolSpec;
pub use crate::tools::{ErrorCategory, Tool, ToolError, ToolFuture, ToolResult, ToolSet, parse_tool_args};
