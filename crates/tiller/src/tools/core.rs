//! Tool abstraction and the sandbox entry point.
//!
//! The [`Tool`] trait defines what every sandbox tool implements: a static
//! declaration (name, description, JSON schema) and an async `execute`
//! method. Tools are collected into a [`ToolSet`], whose
//! [`execute_tool_call`](ToolSet::execute_tool_call) is the single entry
//! point the agent loop calls. That entry point is total: whatever happens
//! inside a tool, the caller gets back a complete [`ToolResult`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::error::ToolError;
use crate::ToolDef;
use crate::config::SandboxConfig;

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

// ── ToolResult ─────────────────────────────────────────────────────

/// Outcome of one tool invocation, returned for every call.
///
/// Either a complete success payload or a complete error payload; never
/// partially filled.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result carrying a human-readable message for the model.
    pub fn error(tool_call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {error}"),
            is_error: true,
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool the agent can invoke through function-calling.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Tool for Echo {
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn execute(&self, arguments: &str) -> ToolFuture<'_> {
///         let arguments = arguments.to_string();
///         Box::pin(async move {
///             let args: EchoArgs = parse_tool_args("echo", &arguments)?;
///             Ok(args.text)
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The declaration offered to the model.
    fn definition(&self) -> ToolDef;

    /// Execute with the raw JSON arguments string.
    ///
    /// Expected failures are returned as [`ToolError`]s; the
    /// [`ToolSet`] turns them into error results.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// Whether the tool can change the working directory. Mutating calls
    /// are logged at INFO on completion.
    fn is_mutation(&self) -> bool {
        false
    }

    /// The tool's name (delegates to the definition).
    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// An ordered collection of tools dispatched by name.
///
/// Declaration order is preserved: [`definitions`](Self::definitions)
/// returns tools in registration order, which is the order the stance
/// filter keeps.
///
/// # Example
///
/// ```ignore
/// let tools = ToolSet::sandbox(&SandboxConfig::default().with_workdir("/repo"))?;
/// let result = tools
///     .execute_tool_call("read_file", r#"{"path": "Cargo.toml"}"#, Some("call-1"))
///     .await;
/// assert!(!result.is_error);
/// ```
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
    /// Whether to validate tool arguments against JSON Schema before execution.
    validate_args: bool,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("validate_args", &self.validate_args)
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            validate_args: false,
        }
    }

    /// Build the standard sandbox: `read_file`, `write_file`, `edit_file`,
    /// `list_dir`, `search` and `shell`, all confined to `config.workdir`.
    ///
    /// Fails only if the working directory cannot be opened.
    pub fn sandbox(config: &SandboxConfig) -> Result<Self, ToolError> {
        use super::common::{EditFile, ListDir, ReadFile, Search, Shell, WriteFile};
        use super::path::Confinement;

        let confinement = Confinement::new(&config.workdir)?;
        info!(
            "[sandbox] working directory: {}",
            confinement.root().display()
        );
        Ok(Self::new()
            .with_arg_validation(config.validate_args)
            .with(ReadFile::new(confinement.clone()))
            .with(WriteFile::new(confinement.clone()))
            .with(EditFile::new(confinement.clone()))
            .with(ListDir::new(confinement.clone()))
            .with(Search::new(confinement.clone()).max_chars(config.search_max_chars))
            .with(Shell::new(confinement).timeout(config.shell_timeout())))
    }

    /// Enable JSON Schema argument validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        match self.tools.iter().position(|t| t.name() == name) {
            Some(idx) => self.tools[idx] = Box::new(tool),
            None => self.tools.push(Box::new(tool)),
        }
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// All tool declarations, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether `name` is a registered tool that mutates the working directory.
    pub fn is_mutation_tool(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.is_mutation())
    }

    /// Execute a tool call and always produce a [`ToolResult`].
    ///
    /// Unknown tools, invalid arguments, confinement violations,
    /// precondition failures, non-zero exits and panics inside a tool all
    /// come back as `is_error: true` results. When `call_id` is `None` a
    /// fresh `call_<uuid>` id is generated.
    pub async fn execute_tool_call(
        &self,
        name: &str,
        arguments: &str,
        call_id: Option<&str>,
    ) -> ToolResult {
        let tool_call_id = call_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

        match self.dispatch(name, arguments).await {
            Ok(content) => ToolResult::success(tool_call_id, content),
            Err(e) => {
                debug!("[tool] {name} failed ({:?}): {e}", e.category());
                ToolResult::error(tool_call_id, &e)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        if self.validate_args {
            validate_tool_arguments(tool, arguments)?;
        }

        log_tool_call(name, arguments);
        let start = std::time::Instant::now();

        let outcome = AssertUnwindSafe(tool.execute(arguments))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                warn!("[tool] {name} panicked: {message}");
                Err(ToolError::Internal {
                    tool: name.to_string(),
                    message,
                })
            });

        let elapsed = start.elapsed();
        match &outcome {
            Ok(_) if tool.is_mutation() => info!(
                "[tool] {name} applied in {:.0}ms",
                elapsed.as_secs_f64() * 1000.0
            ),
            Ok(content) => {
                debug!(
                    "[tool] {name} completed in {:.0}ms ({} bytes)",
                    elapsed.as_secs_f64() * 1000.0,
                    content.len()
                );
                trace!(
                    "[tool] {name} result preview: {}",
                    content.chars().take(300).collect::<String>()
                );
            }
            Err(_) => debug!(
                "[tool] {name} errored after {:.0}ms",
                elapsed.as_secs_f64() * 1000.0
            ),
        }
        outcome
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Result<(), ToolError> {
    let name = tool.name();
    let args_value: serde_json::Value =
        serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
            tool: name.clone(),
            message: format!("arguments are not valid JSON: {e}"),
        })?;

    let schema = tool.definition().function.parameters;

    // If the schema itself is invalid, skip validation.
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return Ok(());
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments {
            tool: name,
            message: format!(
                "schema validation failed:\n{}\nPlease fix the arguments and try again.",
                errors.join("\n")
            ),
        })
    }
}

/// Parse raw JSON arguments into the tool's typed argument struct.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: &str,
) -> Result<T, ToolError> {
    serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Cut `s` to at most `max_chars` characters, appending a marker that says
/// how much was dropped.
pub fn truncate_chars(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let total = s.chars().count();
            let mut kept = s;
            kept.truncate(cut);
            kept.push_str(&format!(
                "\n... [truncated: output exceeded {max_chars} characters ({total} total)]"
            ));
            kept
        }
        None => s,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
