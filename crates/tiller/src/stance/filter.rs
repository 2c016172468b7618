//! Per-turn tool filtering by stance.

use crate::ToolDef;

use super::registry::{AllowedTools, StanceConfig};

/// The tools a stance leaves usable out of an offered list.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSelection {
    /// No filtering applied; every offered tool is usable. Distinct from an
    /// empty list.
    Unrestricted,
    /// Exactly these tools, in offered order. May be empty.
    Exactly(Vec<ToolDef>),
}

impl ToolSelection {
    /// The concrete tool list, substituting `offered` for
    /// [`Unrestricted`](Self::Unrestricted).
    pub fn resolve(self, offered: &[ToolDef]) -> Vec<ToolDef> {
        match self {
            ToolSelection::Unrestricted => offered.to_vec(),
            ToolSelection::Exactly(tools) => tools,
        }
    }

    pub fn permits(&self, tool_name: &str) -> bool {
        match self {
            ToolSelection::Unrestricted => true,
            ToolSelection::Exactly(tools) => tools.iter().any(|t| t.name() == tool_name),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, ToolSelection::Unrestricted)
    }
}

/// Filter `tools` through `stance`.
///
/// Order is preserved and tools the stance names but nobody offered are
/// simply absent. Pure; callers re-run it every turn.
pub fn filter_tools(tools: &[ToolDef], stance: &StanceConfig) -> ToolSelection {
    match stance.allowed_tools {
        AllowedTools::All => ToolSelection::Unrestricted,
        AllowedTools::None => ToolSelection::Exactly(Vec::new()),
        AllowedTools::Only(allowed) => ToolSelection::Exactly(
            tools
                .iter()
                .filter(|t| allowed.contains(&t.name()))
                .cloned()
                .collect(),
        ),
    }
}
