//! Governance layer for autonomous, multi-turn coding agents.
//!
//! `tiller` sits between an agent loop and the host machine. At every turn it
//! decides what the agent may do, notices when the agent asks to change its
//! operating posture, stops the agent from cycling on the same action, and
//! runs the agent's file and shell actions inside a working-directory
//! sandbox.
//!
//! The loop that talks to the model is not part of this crate. It drives
//! `tiller` through a [`Session`](session::Session) and a
//! [`ToolSet`](tools::core::ToolSet):
//!
//! ```ignore
//! use tiller::prelude::*;
//!
//! let config = SandboxConfig::default().with_workdir("/path/to/project");
//! let tools = ToolSet::sandbox(&config)?;
//! let mut session = Session::new("session-1");
//!
//! loop {
//!     session.advance_turn();
//!
//!     // 1. What does the current stance allow the model to see?
//!     let offered = session.offered_tools(&tools.definitions()).resolve(&tools.definitions());
//!     let preamble = session.context_preamble();
//!
//!     // ... call the model with `preamble` and `offered` ...
//!
//!     // 2. Did the model ask for a different stance?
//!     if let Some(outcome) = session.observe_response(&reply_text) {
//!         for signal in &outcome.signals {
//!             eprintln!("advisory: {signal}");
//!         }
//!     }
//!
//!     // 3. Run each requested tool call.
//!     for call in reply_tool_calls {
//!         let result = session
//!             .run_tool(&tools, &call.name, &call.arguments, Some(&call.id))
//!             .await;
//!         // ... feed `result` back to the model ...
//!     }
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Stances and tool permissions:** [`stance::registry`] holds the fixed
//!   table of stances ([`Stance`](stance::Stance),
//!   [`StanceConfig`](stance::StanceConfig)); [`stance::filter`] narrows the
//!   offered tool declarations to what the active stance allows.
//!
//! - **Stance shifts:** [`stance::shift`] detects a `[stance: NAME]`
//!   directive in free-form model output, applies it to the
//!   [`LoopState`](session::LoopState), and reports thrashing.
//!
//! - **Repeat detection:** [`session::awareness`] keeps the per-session action
//!   log, counts consecutive identical actions, and hands back cached results
//!   once an action has clearly stabilized.
//!
//! - **Tool execution:** [`tools`] declares the sandbox tools and executes
//!   them through [`ToolSet::execute_tool_call`](tools::core::ToolSet::execute_tool_call),
//!   which always returns a complete [`ToolResult`](tools::core::ToolResult).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`stance`] | Stance registry, per-turn tool filter, shift detection and thrashing signal |
//! | [`session`] | [`Session`](session::Session) context, [`LoopState`](session::LoopState), repeat-awareness tracker |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet), sandboxed file/shell/search tools, path confinement |
//! | [`config`] | [`SandboxConfig`](config::SandboxConfig) with defaults and JSON loading |

pub mod config;
pub mod prelude;
pub mod session;
pub mod stance;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between the typed argument
/// structs of the sandbox tools and the parameter objects in their
/// [`ToolDef`]s.
///
/// # Example
///
/// ```
/// use tiller::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     pattern: String,
///     #[serde(default)]
///     path: Option<String>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"pattern".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool declaration types ─────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// A tool declaration offered to the model (function-calling format).
///
/// This is the schema surface the model-calling layer consumes; it is
/// filtered per turn by [`stance::filter::filter_tools`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// The declared tool name.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
