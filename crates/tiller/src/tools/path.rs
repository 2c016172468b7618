//! Working-directory confinement for sandbox paths.
//!
//! Every path-bearing tool argument goes through [`Confinement::resolve`]
//! before the tool touches the filesystem. The requested path is joined onto
//! the sandbox root and normalized lexically, so `..` segments are resolved
//! without following anything on disk; the result must still start with the
//! root. When part of the resolved path already exists, its canonical form
//! is checked as well, which catches symlinks pointing out of the root.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use super::error::ToolError;

/// The sandbox root and the path resolution rules around it.
#[derive(Debug, Clone)]
pub struct Confinement {
    root: PathBuf,
}

impl Confinement {
    /// Confine paths to `workdir`. The directory must exist; it is
    /// canonicalized once here so later prefix checks compare like with like.
    pub fn new(workdir: impl AsRef<Path>) -> Result<Self, ToolError> {
        let workdir = workdir.as_ref();
        let root = std::fs::canonicalize(workdir)
            .map_err(|e| ToolError::io("cannot open working directory", workdir, e))?;
        Ok(Self { root })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` against the root, rejecting anything that lands
    /// outside it. Absolute paths are accepted when they point inside the
    /// root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ToolError> {
        let joined = self.root.join(requested);
        let resolved = normalize(&joined);

        if !resolved.starts_with(&self.root) {
            warn!("[sandbox] rejected path outside root: {requested}");
            return Err(ToolError::AccessDenied {
                path: requested.to_string(),
            });
        }

        if let Some(existing) = deepest_existing(&resolved)
            && let Ok(canonical) = std::fs::canonicalize(existing)
            && !canonical.starts_with(&self.root)
        {
            warn!("[sandbox] rejected path escaping root via symlink: {requested}");
            return Err(ToolError::AccessDenied {
                path: requested.to_string(),
            });
        }

        Ok(resolved)
    }

    /// Render `path` relative to the root for messages shown to the model.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Lexically normalize a path: drop `.` and resolve `..` against the
/// components seen so far. Never touches the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// The longest prefix of `path` that exists on disk.
fn deepest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}
