//! Sandbox and session configuration with sensible defaults.
//!
//! [`SandboxConfig`] captures the settings a governed session needs and
//! turns them into a ready [`ToolSet`](crate::tools::ToolSet) via
//! [`ToolSet::sandbox`](crate::tools::ToolSet::sandbox). It can be built in
//! code with the `with_*` methods or loaded from a JSON file, in which every
//! field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stance::{StanceConfig, get_stance};
use crate::tools::common::SEARCH_MAX_CHARS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Root every tool is confined to. Default: `"."`.
    pub workdir: PathBuf,
    /// Validate tool arguments against their JSON schema. Default: `true`.
    pub validate_args: bool,
    /// Kill `shell` commands after this many seconds. Default: no limit.
    pub shell_timeout_secs: Option<u64>,
    /// Character cap on `search` output. Default: `100_000`.
    pub search_max_chars: usize,
    /// Stance a new session starts in. Unknown names fall back to `do`.
    /// Default: `"do"`.
    pub default_stance: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            validate_args: true,
            shell_timeout_secs: None,
            search_max_chars: SEARCH_MAX_CHARS,
            default_stance: "do".to_string(),
        }
    }
}

impl SandboxConfig {
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_validate_args(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    pub fn with_shell_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.shell_timeout_secs = secs;
        self
    }

    pub fn with_search_max_chars(mut self, max: usize) -> Self {
        self.search_max_chars = max;
        self
    }

    pub fn with_default_stance(mut self, stance: impl Into<String>) -> Self {
        self.default_stance = stance.into();
        self
    }

    pub fn shell_timeout(&self) -> Option<Duration> {
        self.shell_timeout_secs.map(Duration::from_secs)
    }

    /// The configuration of the stance new sessions start in.
    pub fn initial_stance(&self) -> &'static StanceConfig {
        get_stance(&self.default_stance)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let config: SandboxConfig = serde_json::from_str(&data)
            .map_err(|e| format!("failed to parse config {}: {e}", path.display()))?;
        debug!("Loaded sandbox config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
