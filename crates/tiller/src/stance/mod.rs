//! Stances: named operating postures of the agent.
//!
//! - [`registry`]: the fixed [`Stance`] table and [`get_stance`].
//! - [`filter`]: [`filter_tools`], the per-turn view of the offered tools.
//! - [`shift`]: [`detect_shift`] and [`apply_shift`] for `[stance: NAME]`
//!   directives, with thrashing detection.

pub mod filter;
pub mod registry;
pub mod shift;

pub use filter::{ToolSelection, filter_tools};
pub use registry::{AllowedTools, Stance, StanceConfig, get_stance};
pub use shift::{
    ShiftSignal, StanceTransition, THRASH_MAX_TRANSITIONS, THRASH_WINDOW_TURNS, apply_shift,
    detect_shift,
};
