//! Per-session governance state and the per-turn helpers built on it.
//!
//! A [`Session`] bundles the [`LoopState`] (current stance, turn counter,
//! stance history) with the [`SessionTracker`]. The agent loop itself lives
//! outside this crate; each turn it calls into the session in this order:
//!
//! 1. [`observe_response`](Session::observe_response) on the latest model
//!    output, which applies any `[stance: NAME]` directive;
//! 2. [`offered_tools`](Session::offered_tools) to filter the declarations
//!    sent with the next request;
//! 3. [`run_tool`](Session::run_tool) for each tool call the model makes;
//! 4. [`advance_turn`](Session::advance_turn).

pub mod awareness;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use awareness::{
    ActionRecord, Escalation, FINGERPRINT_MARKER, RepeatNotice, SessionTracker, target_file,
};

use crate::ToolDef;
use crate::stance::{
    ShiftSignal, Stance, StanceConfig, StanceTransition, ToolSelection, apply_shift,
    detect_shift, filter_tools,
};
use crate::tools::{ToolError, ToolResult, ToolSet, names};

/// Loop state for one session.
///
/// `stance` and `stance_history` change only through
/// [`apply_shift`]; `turn` only through the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub session_id: String,
    pub stance: Stance,
    pub turn: u32,
    pub stance_history: Vec<StanceTransition>,
    /// Conversation messages, owned and interpreted by the external loop.
    pub messages: Vec<serde_json::Value>,
}

impl LoopState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stance: Stance::default(),
            turn: 0,
            stance_history: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// A stance change applied by [`Session::observe_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftOutcome {
    pub from: Stance,
    pub to: Stance,
    pub signals: Vec<ShiftSignal>,
}

impl ShiftOutcome {
    pub fn is_thrashing(&self) -> bool {
        self.signals.contains(&ShiftSignal::StanceThrashing)
    }
}

/// One governed agent session.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: LoopState,
    pub tracker: SessionTracker,
}

impl Session {
    /// A session in the default stance at turn 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            state: LoopState::new(id),
            tracker: SessionTracker::new(),
        }
    }

    /// A session starting in `stance` instead of the default. The initial
    /// stance is not a transition and is not recorded in the history.
    pub fn with_stance(id: impl Into<String>, stance: Stance) -> Self {
        let mut session = Self::new(id);
        session.state.stance = stance;
        session
    }

    pub fn id(&self) -> &str {
        &self.state.session_id
    }

    pub fn stance(&self) -> Stance {
        self.state.stance
    }

    pub fn stance_config(&self) -> &'static StanceConfig {
        self.state.stance.config()
    }

    /// The subset of `offered` usable this turn.
    pub fn offered_tools(&self, offered: &[ToolDef]) -> ToolSelection {
        filter_tools(offered, self.stance_config())
    }

    pub fn is_tool_permitted(&self, name: &str) -> bool {
        self.stance_config().permits(name)
    }

    /// Apply the stance directive in `response`, if there is a valid one.
    pub fn observe_response(&mut self, response: &str) -> Option<ShiftOutcome> {
        let from = self.state.stance;
        let to = detect_shift(response, from)?;
        let signals = apply_shift(&mut self.state, to);
        Some(ShiftOutcome { from, to, signals })
    }

    pub fn advance_turn(&mut self) {
        self.state.turn += 1;
        debug!("[session] {} turn {}", self.state.session_id, self.state.turn);
    }

    /// Turns spent in the current stance: since the last transition, or
    /// since the session started.
    pub fn turns_in_stance(&self) -> u32 {
        let since = self.state.stance_history.last().map_or(0, |t| t.turn);
        self.state.turn.saturating_sub(since)
    }

    /// Whether the current stance has used up its turn budget. Unbounded
    /// stances never do.
    pub fn turn_budget_exhausted(&self) -> bool {
        let config = self.stance_config();
        !config.is_unbounded() && self.turns_in_stance() >= config.max_turns
    }

    /// Run one tool call under the session's governance.
    ///
    /// Tools the current stance does not permit are refused without
    /// touching the sandbox and without being recorded. From the third
    /// identical call in a row, a cached result is replayed instead of
    /// running the tool again, except for tools that mutate the working
    /// directory: those always run, and the streak only adds a warning.
    /// Reminder and warning text is appended to the returned content. Only
    /// successful results are cached.
    pub async fn run_tool(
        &mut self,
        tools: &ToolSet,
        name: &str,
        arguments: &str,
        call_id: Option<&str>,
    ) -> ToolResult {
        let call_id = call_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

        if !self.is_tool_permitted(name) {
            warn!(
                "[session] denied {name}: not available in stance '{}'",
                self.state.stance
            );
            let error = ToolError::NotPermitted {
                tool: name.to_string(),
                stance: self.state.stance.to_string(),
            };
            return ToolResult::error(call_id, &error);
        }

        let target = action_target(name, arguments);
        let turn = self.state.turn;

        if !tools.is_mutation_tool(name)
            && self.tracker.consecutive_count(name, &target) >= 2
            && let Some(cached) = self.tracker.last_result_for(name, &target).map(str::to_string)
        {
            info!("[session] replaying cached {name} result for '{target}'");
            let notice = self.tracker.note_action(name, &target, turn, None);
            return ToolResult::success(call_id, with_notice(cached, &notice, name, &target));
        }

        let mut result = tools.execute_tool_call(name, arguments, Some(&call_id)).await;
        let recorded = (!result.is_error).then(|| result.content.clone());
        let mut notice = self.tracker.note_action(name, &target, turn, recorded);
        if tools.is_mutation_tool(name) {
            // A streak of mutations escalates to a warning, never a replay.
            notice.cached = None;
        }
        result.content = with_notice(result.content, &notice, name, &target);
        result
    }

    /// Stance guidance plus the awareness line, for the model's context.
    pub fn context_preamble(&self) -> String {
        let config = self.stance_config();
        let mut preamble = format!("Current stance: {}\n{}", config.stance, config.guidance);
        if !config.is_unbounded() {
            preamble.push_str(&format!(
                "\nTurn budget: {} of {} used.",
                self.turns_in_stance().min(config.max_turns),
                config.max_turns
            ));
        }
        if let Some(awareness) = self.tracker.awareness() {
            preamble.push('\n');
            preamble.push_str(&awareness);
        }
        preamble
    }
}

/// The tracker target for a tool call: the path, command or pattern it
/// acts on. Falls back to the raw arguments for unknown shapes.
///
/// `write_file` and `edit_file` targets also carry a fingerprint of the
/// content they apply, so two different edits to one file are different
/// actions. [`awareness::target_file`] recovers the path.
pub fn action_target(name: &str, arguments: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(arguments).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
    };

    let target = match name {
        names::SHELL => field("command").map(str::to_string),
        names::SEARCH => field("pattern").map(|pattern| match field("path") {
            Some(path) => format!("{pattern} in {path}"),
            None => pattern.to_string(),
        }),
        names::LIST_DIR => Some(field("path").unwrap_or(".").to_string()),
        names::WRITE_FILE => field("path").map(|path| {
            let hash = fingerprint(&[field("content").unwrap_or_default()]);
            format!("{path}{FINGERPRINT_MARKER}{hash:016x}")
        }),
        names::EDIT_FILE => field("path").map(|path| {
            let hash = fingerprint(&[
                field("old_string").unwrap_or_default(),
                field("new_string").unwrap_or_default(),
            ]);
            format!("{path}{FINGERPRINT_MARKER}{hash:016x}")
        }),
        _ => field("path").map(str::to_string),
    };
    target.unwrap_or_else(|| arguments.trim().to_string())
}

/// FNV-1a over `parts`, each followed by a separator byte that cannot
/// occur in UTF-8.
fn fingerprint(parts: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

fn with_notice(content: String, notice: &RepeatNotice, action: &str, target: &str) -> String {
    match notice.message(action, target_file(target)) {
        Some(message) => format!("{content}\n\n[{message}]"),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;

    fn sandbox() -> (tempfile::TempDir, ToolSet) {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolSet::sandbox(&SandboxConfig::default().with_workdir(dir.path())).unwrap();
        (dir, tools)
    }

    #[test]
    fn new_session_starts_in_do_at_turn_zero() {
        let session = Session::new("s1");
        assert_eq!(session.stance(), Stance::Do);
        assert_eq!(session.state.turn, 0);
        assert!(session.state.stance_history.is_empty());
        assert!(!session.turn_budget_exhausted());
    }

    #[test]
    fn observe_response_applies_directive() {
        let mut session = Session::new("s1");
        let outcome = session.observe_response("Time to build. [stance: craft]").unwrap();
        assert_eq!((outcome.from, outcome.to), (Stance::Do, Stance::Craft));
        assert!(!outcome.is_thrashing());
        assert_eq!(session.stance(), Stance::Craft);
        assert!(session.observe_response("[stance: craft]").is_none());
    }

    #[test]
    fn turn_budget_counts_from_last_transition() {
        let mut session = Session::new("s1");
        session.advance_turn();
        session.advance_turn();
        session.observe_response("[stance: plan]");
        assert_eq!(session.turns_in_stance(), 0);
        assert!(!session.turn_budget_exhausted());
        session.advance_turn();
        assert_eq!(session.turns_in_stance(), 1);
        assert!(session.turn_budget_exhausted());
    }

    #[test]
    fn action_target_by_tool() {
        assert_eq!(action_target("read_file", r#"{"path": "a.rs"}"#), "a.rs");
        assert_eq!(action_target("shell", r#"{"command": "ls -la"}"#), "ls -la");
        assert_eq!(action_target("search", r#"{"pattern": "foo"}"#), "foo");
        assert_eq!(
            action_target("search", r#"{"pattern": "foo", "path": "src"}"#),
            "foo in src"
        );
        assert_eq!(action_target("list_dir", "{}"), ".");
        assert_eq!(action_target("custom", " not json "), "not json");
    }

    #[test]
    fn mutation_targets_carry_content_fingerprint() {
        let edit = |old: &str, new: &str| {
            action_target(
                "edit_file",
                &serde_json::json!({"path": "a.txt", "old_string": old, "new_string": new})
                    .to_string(),
            )
        };
        assert_ne!(edit("one", "1"), edit("two", "2"));
        assert_eq!(edit("one", "1"), edit("one", "1"));
        // Field boundaries matter: "ab"+"c" is not "a"+"bc".
        assert_ne!(edit("ab", "c"), edit("a", "bc"));
        assert_eq!(target_file(&edit("one", "1")), "a.txt");

        let write = |content: &str| {
            action_target(
                "write_file",
                &serde_json::json!({"path": "f.txt", "content": content}).to_string(),
            )
        };
        assert_ne!(write("v1"), write("v2"));
        assert_eq!(target_file(&write("v1")), "f.txt");
    }

    #[test]
    fn preamble_has_guidance_budget_and_awareness() {
        let mut session = Session::with_stance("s1", Stance::Evidence);
        session
            .tracker
            .note_action("read_file", "a.rs", 0, Some("x".into()));
        let preamble = session.context_preamble();
        assert!(preamble.starts_with("Current stance: evidence"));
        assert!(preamble.contains("Turn budget: 0 of 10 used."));
        assert!(preamble.contains("files read: a.rs"));
    }

    #[tokio::test]
    async fn denied_tool_is_not_recorded_and_has_no_effect() {
        let (dir, tools) = sandbox();
        let mut session = Session::with_stance("s1", Stance::Evidence);
        let result = session
            .run_tool(
                &tools,
                "write_file",
                r#"{"path": "x.txt", "content": "nope"}"#,
                Some("c1"),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(result.tool_call_id, "c1");
        assert!(result.content.contains("not available in stance 'evidence'"));
        assert!(session.tracker.is_empty());
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn third_identical_read_replays_cache() {
        let (dir, tools) = sandbox();
        std::fs::write(dir.path().join("a.txt"), "original").unwrap();
        let mut session = Session::new("s1");
        let args = r#"{"path": "a.txt"}"#;

        let first = session.run_tool(&tools, "read_file", args, None).await;
        assert_eq!(first.content, "original");

        let second = session.run_tool(&tools, "read_file", args, None).await;
        assert!(second.content.starts_with("original\n\n[Note:"));

        // Change the file: a replay must not see it.
        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();
        let third = session.run_tool(&tools, "read_file", args, None).await;
        assert!(!third.is_error);
        assert!(third.content.starts_with("original\n\n[Repeated read_file"));
        assert_eq!(session.tracker.len(), 3);
    }

    #[tokio::test]
    async fn failing_repeats_warn_instead_of_replaying() {
        let (_dir, tools) = sandbox();
        let mut session = Session::new("s1");
        let args = r#"{"command": "exit 1"}"#;
        let mut last = None;
        for _ in 0..3 {
            last = Some(session.run_tool(&tools, "shell", args, None).await);
        }
        let last = last.unwrap();
        assert!(last.is_error);
        assert!(last.content.contains("[Warning:"));
    }

    #[tokio::test]
    async fn distinct_edits_to_one_file_all_apply() {
        let (dir, tools) = sandbox();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "one two three").unwrap();
        let mut session = Session::with_stance("s1", Stance::Craft);

        for (old, new) in [("one", "1"), ("two", "2"), ("three", "3")] {
            let args = serde_json::json!({"path": "a.txt", "old_string": old, "new_string": new});
            let result = session
                .run_tool(&tools, "edit_file", &args.to_string(), None)
                .await;
            assert!(!result.is_error, "{}", result.content);
            assert_eq!(result.content, "Edited a.txt: replaced 1 occurrence");
        }
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "1 2 3");
        assert_eq!(session.tracker.files_written(), ["a.txt"]);
    }

    #[tokio::test]
    async fn distinct_writes_to_one_file_all_apply() {
        let (dir, tools) = sandbox();
        let mut session = Session::with_stance("s1", Stance::Craft);

        for content in ["v1", "v2", "v3"] {
            let args = serde_json::json!({"path": "f.txt", "content": content});
            let result = session
                .run_tool(&tools, "write_file", &args.to_string(), None)
                .await;
            assert_eq!(result.content, "Wrote 2 bytes to f.txt");
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "v3"
        );
    }

    #[tokio::test]
    async fn identical_writes_always_run_and_only_warn() {
        let (dir, tools) = sandbox();
        let file = dir.path().join("f.txt");
        let mut session = Session::with_stance("s1", Stance::Craft);
        let args = r#"{"path": "f.txt", "content": "v"}"#;

        session.run_tool(&tools, "write_file", args, None).await;
        let second = session.run_tool(&tools, "write_file", args, None).await;
        assert!(second.content.contains("[Note:"));

        std::fs::write(&file, "changed behind the agent's back").unwrap();
        let third = session.run_tool(&tools, "write_file", args, None).await;
        assert!(!third.is_error);
        assert!(third.content.starts_with("Wrote 1 bytes to f.txt"));
        assert!(third.content.contains("[Warning:"));
        assert!(!third.content.contains("cached"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "v");
    }

    #[tokio::test]
    async fn repeated_shell_commands_are_never_replayed() {
        let (dir, tools) = sandbox();
        let mut session = Session::new("s1");
        let args = r#"{"command": "echo tick >> ticks.log"}"#;
        for _ in 0..3 {
            let result = session.run_tool(&tools, "shell", args, None).await;
            assert!(!result.is_error);
        }
        let log = std::fs::read_to_string(dir.path().join("ticks.log")).unwrap();
        assert_eq!(log.lines().count(), 3);
    }
}
