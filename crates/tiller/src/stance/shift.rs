//! Stance shift detection and application.
//!
//! The agent asks for a new stance by writing `[stance: NAME]` anywhere in
//! its response. [`detect_shift`] validates the request against the
//! registry; [`apply_shift`] records it and reports thrashing, which is
//! advisory and never blocks the shift.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::registry::Stance;
use crate::session::LoopState;

/// Transitions are counted over this many most recent turns.
pub const THRASH_WINDOW_TURNS: u32 = 5;

/// More transitions than this inside the window is thrashing.
pub const THRASH_MAX_TRANSITIONS: usize = 3;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*stance\s*:\s*([a-z0-9_-]+)\s*\]")
        .expect("stance directive pattern is valid")
});

/// One recorded stance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanceTransition {
    pub from: Stance,
    pub to: Stance,
    pub turn: u32,
    pub timestamp: DateTime<Utc>,
}

/// Advisory signals raised by [`apply_shift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSignal {
    /// The stance changed more than [`THRASH_MAX_TRANSITIONS`] times within
    /// [`THRASH_WINDOW_TURNS`] turns.
    StanceThrashing,
}

impl ShiftSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftSignal::StanceThrashing => "stance_thrashing",
        }
    }
}

impl fmt::Display for ShiftSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the stance requested in `response`, if any.
///
/// Only the first directive counts. Returns `None` when there is no
/// directive, when it names no known stance, or when it names `current`.
pub fn detect_shift(response: &str, current: Stance) -> Option<Stance> {
    let captures = DIRECTIVE.captures(response)?;
    let name = captures.get(1)?.as_str();

    let requested = match name.parse::<Stance>() {
        Ok(stance) => stance,
        Err(_) => {
            debug!("[stance] ignoring directive for unknown stance '{name}'");
            return None;
        }
    };
    if requested == current {
        debug!("[stance] ignoring directive for current stance '{current}'");
        return None;
    }
    Some(requested)
}

/// Switch `state` to `to`, recording the transition at the current turn.
///
/// The shift always happens. The returned signals only describe it.
pub fn apply_shift(state: &mut LoopState, to: Stance) -> Vec<ShiftSignal> {
    let transition = StanceTransition {
        from: state.stance,
        to,
        turn: state.turn,
        timestamp: Utc::now(),
    };
    info!(
        "[stance] {} -> {} at turn {}",
        transition.from, transition.to, transition.turn
    );
    state.stance_history.push(transition);
    state.stance = to;

    // t.turn > turn - WINDOW, without underflow on early turns.
    let recent = state
        .stance_history
        .iter()
        .filter(|t| t.turn.saturating_add(THRASH_WINDOW_TURNS) > state.turn)
        .count();

    let mut signals = Vec::new();
    if recent > THRASH_MAX_TRANSITIONS {
        warn!(
            "[stance] thrashing: {recent} transitions within the last {THRASH_WINDOW_TURNS} turns"
        );
        signals.push(ShiftSignal::StanceThrashing);
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_craft_from_do() {
        assert_eq!(
            detect_shift("Let me start. [stance: craft]", Stance::Do),
            Some(Stance::Craft)
        );
    }

    #[test]
    fn directive_pattern_compiles() {
        let re = LazyLock::force(&DIRECTIVE);
        assert!(re.is_match("[stance: do]"));
        assert!(!re.is_match("stance: do"));
    }

    #[test]
    fn same_stance_is_not_a_shift() {
        assert_eq!(detect_shift("[stance: craft]", Stance::Craft), None);
    }

    #[test]
    fn bogus_stance_is_ignored() {
        assert_eq!(detect_shift("[stance: bogus]", Stance::Do), None);
    }

    #[test]
    fn no_directive() {
        assert_eq!(detect_shift("just some text about stances", Stance::Do), None);
    }

    #[test]
    fn matching_is_case_insensitive_and_whitespace_tolerant() {
        assert_eq!(
            detect_shift("[STANCE: Evidence]", Stance::Do),
            Some(Stance::Evidence)
        );
        assert_eq!(
            detect_shift("[ stance :plan ]", Stance::Do),
            Some(Stance::Plan)
        );
    }

    #[test]
    fn only_first_directive_counts() {
        assert_eq!(
            detect_shift("[stance: review] then [stance: craft]", Stance::Do),
            Some(Stance::Review)
        );
        // A first directive that is rejected is not skipped over.
        assert_eq!(
            detect_shift("[stance: bogus] [stance: craft]", Stance::Do),
            None
        );
    }

    #[test]
    fn apply_records_transition() {
        let mut state = LoopState::new("s1");
        state.turn = 4;
        let signals = apply_shift(&mut state, Stance::Craft);
        assert!(signals.is_empty());
        assert_eq!(state.stance, Stance::Craft);
        assert_eq!(state.stance_history.len(), 1);
        let t = &state.stance_history[0];
        assert_eq!((t.from, t.to, t.turn), (Stance::Do, Stance::Craft, 4));
    }

    #[test]
    fn four_shifts_in_one_turn_thrash() {
        let mut state = LoopState::new("s1");
        state.turn = 10;
        let cycle = [Stance::Craft, Stance::Evidence, Stance::Craft, Stance::Evidence];
        let signals: Vec<Vec<ShiftSignal>> =
            cycle.iter().map(|s| apply_shift(&mut state, *s)).collect();
        assert!(signals[..3].iter().all(Vec::is_empty));
        assert_eq!(signals[3], vec![ShiftSignal::StanceThrashing]);
        assert_eq!(signals[3][0].to_string(), "stance_thrashing");
    }

    #[test]
    fn early_turns_count_every_transition() {
        let mut state = LoopState::new("s1");
        let mut last = Vec::new();
        for (turn, stance) in [Stance::Craft, Stance::Do, Stance::Craft, Stance::Do]
            .into_iter()
            .enumerate()
        {
            state.turn = turn as u32;
            last = apply_shift(&mut state, stance);
        }
        assert_eq!(last, vec![ShiftSignal::StanceThrashing]);
    }

    #[test]
    fn transitions_outside_window_do_not_count() {
        let mut state = LoopState::new("s1");
        for (turn, stance) in [(1, Stance::Craft), (2, Stance::Do), (3, Stance::Craft)] {
            state.turn = turn;
            apply_shift(&mut state, stance);
        }
        // Window at turn 8 covers turns 4..=8; turns 1 to 3 have aged out.
        state.turn = 8;
        assert!(apply_shift(&mut state, Stance::Evidence).is_empty());
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let mut state = LoopState::new("s1");
        for stance in [Stance::Craft, Stance::Do, Stance::Craft] {
            state.turn = 5;
            apply_shift(&mut state, stance);
        }
        // At turn 10 the window is turns > 5, so the three at turn 5 are out.
        state.turn = 10;
        assert!(apply_shift(&mut state, Stance::Do).is_empty());
        // At turn 9 they would have counted.
        let mut state2 = state.clone();
        state2.stance_history.pop();
        state2.turn = 9;
        assert_eq!(
            apply_shift(&mut state2, Stance::Do),
            vec![ShiftSignal::StanceThrashing]
        );
    }
}
