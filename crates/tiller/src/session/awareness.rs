//! Per-session action log with repeat detection.
//!
//! Every executed tool call is appended as an [`ActionRecord`]. Repeating
//! the exact same action on the same target escalates: the second time
//! earns a reminder, the third and later a warning, or a replay of the
//! cached result when one exists, so the loop can stop re-running it.
//!
//! The log is append-only. Repeat detection only ever reads its tail.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::names;

/// Separates a file path from the content fingerprint in `write_file` and
/// `edit_file` targets.
pub const FINGERPRINT_MARKER: &str = " #";

/// The file a target refers to, with any content fingerprint removed.
pub fn target_file(target: &str) -> &str {
    match target.rsplit_once(FINGERPRINT_MARKER) {
        Some((path, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            path
        }
        _ => target,
    }
}

/// One executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: String,
    pub target: String,
    pub turn: u32,
    pub result: Option<String>,
}

/// How much of a streak the action just recorded extends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepeatNotice {
    /// Length of the streak including this action, or `0` for a first
    /// occurrence.
    pub repeat: usize,
    /// The most recent result for the same action, offered from the third
    /// repeat on.
    pub cached: Option<String>,
}

/// What the loop should do about a [`RepeatNotice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    None,
    Reminder,
    Warning,
    Replay,
}

impl RepeatNotice {
    pub fn escalation(&self) -> Escalation {
        match (self.repeat, &self.cached) {
            (0 | 1, _) => Escalation::None,
            (2, _) => Escalation::Reminder,
            (_, Some(_)) => Escalation::Replay,
            (_, None) => Escalation::Warning,
        }
    }

    /// Text to put in front of the agent, if any.
    pub fn message(&self, action: &str, target: &str) -> Option<String> {
        let n = self.repeat;
        match self.escalation() {
            Escalation::None => None,
            Escalation::Reminder => Some(format!(
                "Note: you have run {action} on '{target}' {n} times in a row. \
                 The previous result is still valid; use it instead of repeating the call."
            )),
            Escalation::Warning => Some(format!(
                "Warning: {action} on '{target}' has now run {n} times in a row with no \
                 progress. Change your approach."
            )),
            Escalation::Replay => Some(format!(
                "Repeated {action} on '{target}' {n} times in a row; returning the cached \
                 result instead of running it again. Change your approach."
            )),
        }
    }
}

/// The per-session action log.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    records: Vec<ActionRecord>,
    files_read: Vec<String>,
    files_written: Vec<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action and report the streak it extends.
    ///
    /// The streak and the cached result are measured before the new record
    /// is appended, so the cache never returns the result passed in here.
    pub fn note_action(
        &mut self,
        action: &str,
        target: &str,
        turn: u32,
        result: Option<String>,
    ) -> RepeatNotice {
        let prior = self.consecutive_count(action, target);
        let notice = match prior {
            0 => RepeatNotice::default(),
            1 => RepeatNotice {
                repeat: 2,
                cached: None,
            },
            n => RepeatNotice {
                repeat: n + 1,
                cached: self.last_result_for(action, target).map(str::to_string),
            },
        };
        if notice.repeat > 0 {
            debug!(
                "[tracker] {action} '{target}' repeated {} times in a row",
                notice.repeat
            );
        }

        if action == names::READ_FILE {
            push_unique(&mut self.files_read, target_file(target));
        } else if action == names::WRITE_FILE || action == names::EDIT_FILE {
            push_unique(&mut self.files_written, target_file(target));
        }
        self.records.push(ActionRecord {
            action: action.to_string(),
            target: target.to_string(),
            turn,
            result,
        });
        notice
    }

    /// Length of the trailing run of records matching `action` and `target`
    /// exactly. The first non-matching record ends the scan.
    pub fn consecutive_count(&self, action: &str, target: &str) -> usize {
        self.records
            .iter()
            .rev()
            .take_while(|r| r.action == action && r.target == target)
            .count()
    }

    /// The most recent non-empty result recorded for this exact action.
    pub fn last_result_for(&self, action: &str, target: &str) -> Option<&str> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.action == action && r.target == target)
            .find_map(|r| r.result.as_deref().filter(|s| !s.is_empty()))
    }

    /// One summary line for the agent's context, or `None` before the
    /// first action.
    pub fn awareness(&self) -> Option<String> {
        if self.records.is_empty() {
            return None;
        }
        Some(format!(
            "Session so far: files read: {}; files written: {}; {} actions taken.",
            list_or_none(&self.files_read),
            list_or_none(&self.files_written),
            self.records.len()
        ))
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn files_read(&self) -> &[String] {
        &self.files_read
    }

    pub fn files_written(&self) -> &[String] {
        &self.files_written
    }
}

fn push_unique(set: &mut Vec<String>, target: &str) {
    if !set.iter().any(|t| t == target) {
        set.push(target.to_string());
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
