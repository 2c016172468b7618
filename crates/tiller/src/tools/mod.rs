//! The tool sandbox.
//!
//! Every effect the agent can have on the world goes through a [`Tool`]
//! registered in a [`ToolSet`]. The set dispatches by name, validates
//! arguments against each tool's JSON schema, and converts every failure,
//! panics included, into an error [`ToolResult`].
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], [`ToolResult`].
//! - [`common`]: the six sandbox tools. Register all of them with
//!   [`ToolSet::sandbox()`].
//! - [`path`]: [`Confinement`], which keeps every path argument inside the
//!   working directory.
//! - [`error`]: [`ToolError`] and its [`ErrorCategory`].
//! - [`spec`]: [`ToolSpec`](spec::ToolSpec) builder for structured tool
//!   descriptions.
//! - [`names`]: canonical tool name constants.

pub mod common;
pub mod core;
pub mod error;
pub mod names;
pub mod path;
pub mod spec;

pub use core::{
    Tool, ToolFuture, ToolResult, ToolSet, parse_tool_args, truncate_chars,
    validate_tool_arguments,
};
pub use error::{ErrorCategory, ToolError};
pub use path::Confinement;
