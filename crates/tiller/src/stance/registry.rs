//! The fixed stance table.
//!
//! A stance is data: a guidance text for the model, the tools it may use
//! and a turn budget. Behaviour differs between stances only through those
//! fields. The table is built at compile time and lives for the whole
//! process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tools::names;

/// The closed set of stances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    /// General purpose. Every tool, no turn budget.
    #[default]
    Do,
    /// Hands-on implementation work.
    Craft,
    /// Read-only evidence gathering.
    Evidence,
    /// Single-pass planning, no tools.
    Plan,
    /// Single-pass review, no tools.
    Review,
}

impl Stance {
    pub const ALL: [Stance; 5] = [
        Stance::Do,
        Stance::Craft,
        Stance::Evidence,
        Stance::Plan,
        Stance::Review,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stance::Do => "do",
            Stance::Craft => "craft",
            Stance::Evidence => "evidence",
            Stance::Plan => "plan",
            Stance::Review => "review",
        }
    }

    /// The registry entry for this stance.
    pub fn config(self) -> &'static StanceConfig {
        match self {
            Stance::Do => &DO,
            Stance::Craft => &CRAFT,
            Stance::Evidence => &EVIDENCE,
            Stance::Plan => &PLAN,
            Stance::Review => &REVIEW,
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Stance::ALL
            .into_iter()
            .find(|stance| stance.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown stance '{name}'"))
    }
}

/// Which tools a stance may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedTools {
    /// No restriction: every offered tool is usable.
    All,
    /// No tools at all.
    None,
    /// Exactly these tool names.
    Only(&'static [&'static str]),
}

/// One row of the stance table.
#[derive(Debug, PartialEq, Eq)]
pub struct StanceConfig {
    pub stance: Stance,
    /// Instructions handed to the model while this stance is active.
    pub guidance: &'static str,
    pub allowed_tools: AllowedTools,
    /// Turn budget; `0` means unbounded.
    pub max_turns: u32,
}

impl StanceConfig {
    pub fn permits(&self, tool_name: &str) -> bool {
        match self.allowed_tools {
            AllowedTools::All => true,
            AllowedTools::None => false,
            AllowedTools::Only(names) => names.contains(&tool_name),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_turns == 0
    }
}

static DO: StanceConfig = StanceConfig {
    stance: Stance::Do,
    guidance: "Work on the task directly. Use whichever tools you need. \
               When the work calls for a narrower posture, switch with [stance: NAME].",
    allowed_tools: AllowedTools::All,
    max_turns: 0,
};

static CRAFT: StanceConfig = StanceConfig {
    stance: Stance::Craft,
    guidance: "Implement the change. Read what you need, make focused edits, \
               and run the build or tests to confirm them.",
    allowed_tools: AllowedTools::Only(&[
        names::READ_FILE,
        names::WRITE_FILE,
        names::EDIT_FILE,
        names::LIST_DIR,
        names::SEARCH,
        names::SHELL,
    ]),
    max_turns: 30,
};

static EVIDENCE: StanceConfig = StanceConfig {
    stance: Stance::Evidence,
    guidance: "Gather evidence only. Read, list and search; do not modify anything. \
               Report what you found and where.",
    allowed_tools: AllowedTools::Only(&[names::READ_FILE, names::LIST_DIR, names::SEARCH]),
    max_turns: 10,
};

static PLAN: StanceConfig = StanceConfig {
    stance: Stance::Plan,
    guidance: "Produce a plan in a single response: the steps, the files involved \
               and the risks. No tools are available.",
    allowed_tools: AllowedTools::None,
    max_turns: 1,
};

static REVIEW: StanceConfig = StanceConfig {
    stance: Stance::Review,
    guidance: "Review the work so far in a single response: what is done, what is \
               wrong and what remains. No tools are available.",
    allowed_tools: AllowedTools::None,
    max_turns: 1,
};

/// Look a stance up by name, case-insensitively.
///
/// Unknown names fall back to the default stance (`do`) with a warning;
/// this never fails.
pub fn get_stance(name: &str) -> &'static StanceConfig {
    match name.parse::<Stance>() {
        Ok(stance) => stance.config(),
        Err(_) => {
            warn!(
                "[stance] unknown stance '{name}', falling back to '{}'",
                Stance::default()
            );
            Stance::default().config()
        }
    }
}
