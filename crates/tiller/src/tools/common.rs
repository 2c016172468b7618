//! The sandbox tools.
//!
//! Every tool holds a [`Confinement`] and resolves each path argument
//! through it before touching the filesystem. Register all of them at once
//! with [`ToolSet::sandbox`](crate::tools::core::ToolSet::sandbox).
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`ReadFile`] | `read_file` | Read a single file |
//! | [`WriteFile`] | `write_file` | Create or overwrite a file |
//! | [`EditFile`] | `edit_file` | Replace one exact occurrence in a file |
//! | [`ListDir`] | `list_dir` | List a directory |
//! | [`Search`] | `search` | Recursive pattern search (`grep -rns`) |
//! | [`Shell`] | `shell` | Run a command with `sh -c` |

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use super::core::{Tool, ToolFuture, parse_tool_args, truncate_chars};
use super::error::ToolError;
use super::names;
use super::path::Confinement;
use super::spec::ToolSpec;
use crate::ToolDef;

/// Default character cap on `search` output.
pub const SEARCH_MAX_CHARS: usize = 100_000;

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `read_file`.
#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File path relative to the working directory (e.g. 'src/main.rs').
    pub path: String,
}

/// Typed arguments for `write_file`.
#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// File path relative to the working directory. Parent directories are created.
    pub path: String,
    /// The complete new file content.
    pub content: String,
}

/// Typed arguments for `edit_file`.
#[derive(Deserialize, JsonSchema)]
pub struct EditFileArgs {
    /// File path relative to the working directory.
    pub path: String,
    /// Exact text to replace. Must occur exactly once in the file.
    pub old_string: String,
    /// Replacement text.
    pub new_string: String,
}

/// Typed arguments for `list_dir`.
#[derive(Deserialize, JsonSchema)]
pub struct ListDirArgs {
    /// Directory path relative to the working directory (default '.').
    #[serde(default)]
    pub path: Option<String>,
}

/// Typed arguments for `search`.
#[derive(Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Pattern to search for (basic regular expression, as grep).
    pub pattern: String,
    /// Directory or file to search in (relative to the working directory, default '.').
    #[serde(default)]
    pub path: Option<String>,
}

/// Typed arguments for `shell`.
#[derive(Deserialize, JsonSchema)]
pub struct ShellArgs {
    /// Shell command to execute (e.g. 'cargo test', 'git status').
    pub command: String,
}

// ── ReadFile ────────────────────────────────────────────────────────

/// Read a file under the working directory.
pub struct ReadFile {
    confinement: Confinement,
}

impl ReadFile {
    pub fn new(confinement: Confinement) -> Self {
        Self { confinement }
    }
}

impl Tool for ReadFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::READ_FILE)
            .purpose("Read a file from the working directory")
            .when_to_use("When you need the contents of a specific file whose path you know")
            .when_not_to_use(
                "When looking for a pattern across many files, use search instead. \
                 When you need the entries of a directory, use list_dir instead",
            )
            .parameters_for::<ReadFileArgs>()
            .example("read_file(path='src/lib.rs')", "The full text of the file")
            .output_format("Raw file content as text")
            .disambiguate(
                "Need to find which files mention a symbol",
                names::SEARCH,
                "search scans content across files; read_file reads one known file",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: ReadFileArgs = parse_tool_args(names::READ_FILE, &arguments)?;
            let full_path = self.confinement.resolve(&args.path)?;
            require_file(&full_path, &args.path).await?;
            fs::read_to_string(&full_path)
                .await
                .map_err(|e| ToolError::io("cannot read", &full_path, e))
        })
    }
}

// ── WriteFile ───────────────────────────────────────────────────────

/// Create or overwrite a file, creating missing parent directories.
pub struct WriteFile {
    confinement: Confinement,
}

impl WriteFile {
    pub fn new(confinement: Confinement) -> Self {
        Self { confinement }
    }
}

impl Tool for WriteFile {
    fn is_mutation(&self) -> bool {
        true
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::WRITE_FILE)
            .purpose("Write a file, replacing any existing content")
            .when_to_use("When creating a new file or rewriting a file from scratch")
            .when_not_to_use(
                "When changing a small part of an existing file, use edit_file instead",
            )
            .parameters_for::<WriteFileArgs>()
            .example(
                "write_file(path='notes/todo.md', content='# TODO')",
                "Wrote 6 bytes to notes/todo.md",
            )
            .output_format("Confirmation with the number of bytes written")
            .disambiguate(
                "Fixing one line in a large file",
                names::EDIT_FILE,
                "edit_file replaces only the matched text and leaves the rest intact",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: WriteFileArgs = parse_tool_args(names::WRITE_FILE, &arguments)?;
            let full_path = self.confinement.resolve(&args.path)?;

            if let Ok(meta) = fs::metadata(&full_path).await
                && meta.is_dir()
            {
                return Err(ToolError::IsDirectory { path: args.path });
            }
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ToolError::io("cannot create directory", parent, e))?;
            }
            fs::write(&full_path, &args.content)
                .await
                .map_err(|e| ToolError::io("cannot write", &full_path, e))?;

            Ok(format!(
                "Wrote {} bytes to {}",
                args.content.len(),
                self.confinement.display(&full_path)
            ))
        })
    }
}

// ── EditFile ────────────────────────────────────────────────────────

/// Replace exactly one occurrence of a string in a file.
///
/// Zero or multiple occurrences leave the file untouched and report an
/// error, so an edit is never applied to the wrong place.
pub struct EditFile {
    confinement: Confinement,
}

impl EditFile {
    pub fn new(confinement: Confinement) -> Self {
        Self { confinement }
    }
}

impl Tool for EditFile {
    fn is_mutation(&self) -> bool {
        true
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::EDIT_FILE)
            .purpose("Replace one exact occurrence of a string in a file")
            .when_to_use(
                "When making a targeted change to an existing file. old_string must \
                 match exactly once, so include enough surrounding lines",
            )
            .when_not_to_use(
                "When creating a new file or replacing all of its content, use write_file instead",
            )
            .parameters_for::<EditFileArgs>()
            .example(
                "edit_file(path='src/lib.rs', old_string='fn old()', new_string='fn new()')",
                "Edited src/lib.rs: replaced 1 occurrence",
            )
            .output_format("Confirmation naming the edited file")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: EditFileArgs = parse_tool_args(names::EDIT_FILE, &arguments)?;
            if args.old_string.is_empty() {
                return Err(ToolError::InvalidArguments {
                    tool: names::EDIT_FILE.to_string(),
                    message: "old_string must not be empty".to_string(),
                });
            }
            let full_path = self.confinement.resolve(&args.path)?;
            require_file(&full_path, &args.path).await?;

            let content = fs::read_to_string(&full_path)
                .await
                .map_err(|e| ToolError::io("cannot read", &full_path, e))?;

            match content.matches(args.old_string.as_str()).count() {
                0 => return Err(ToolError::EditTargetNotFound { path: args.path }),
                1 => {}
                occurrences => {
                    return Err(ToolError::AmbiguousEdit {
                        path: args.path,
                        occurrences,
                    });
                }
            }

            let updated = content.replacen(&args.old_string, &args.new_string, 1);
            fs::write(&full_path, updated)
                .await
                .map_err(|e| ToolError::io("cannot write", &full_path, e))?;

            Ok(format!(
                "Edited {}: replaced 1 occurrence",
                self.confinement.display(&full_path)
            ))
        })
    }
}

// ── ListDir ─────────────────────────────────────────────────────────

/// List the entries of a directory, sorted, with directories marked by a
/// trailing `/`.
pub struct ListDir {
    confinement: Confinement,
}

impl ListDir {
    pub fn new(confinement: Confinement) -> Self {
        Self { confinement }
    }
}

impl Tool for ListDir {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::LIST_DIR)
            .purpose("List the entries of a directory")
            .when_to_use("When exploring the project layout or checking what a directory contains")
            .when_not_to_use(
                "When you need file contents, use read_file. \
                 When looking for text inside files, use search",
            )
            .parameters_for::<ListDirArgs>()
            .example("list_dir(path='src')", "lib.rs\nmain.rs\ntools/")
            .output_format("One entry per line, sorted; directories end with '/'")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: ListDirArgs = parse_tool_args(names::LIST_DIR, &arguments)?;
            let requested = args.path.unwrap_or_else(|| ".".to_string());
            let full_path = self.confinement.resolve(&requested)?;

            let meta = fs::metadata(&full_path).await.map_err(|_| ToolError::NotFound {
                path: requested.clone(),
            })?;
            if !meta.is_dir() {
                return Err(ToolError::InvalidArguments {
                    tool: names::LIST_DIR.to_string(),
                    message: format!("'{requested}' is not a directory. Use read_file for files"),
                });
            }

            let mut reader = fs::read_dir(&full_path)
                .await
                .map_err(|e| ToolError::io("cannot list", &full_path, e))?;
            let mut entries = Vec::new();
            while let Some(entry) = reader
                .next_entry()
                .await
                .map_err(|e| ToolError::io("cannot list", &full_path, e))?
            {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    name.push('/');
                }
                entries.push(name);
            }
            entries.sort();

            if entries.is_empty() {
                Ok("(empty directory)".to_string())
            } else {
                Ok(entries.join("\n"))
            }
        })
    }
}

// ── Search ──────────────────────────────────────────────────────────

/// Recursive pattern search with `grep -rns`.
///
/// Matches are reported as `path:line:text` relative to the working
/// directory. No matches is a normal result, not an error. Output past
/// `max_chars` characters is cut with an explicit marker.
pub struct Search {
    confinement: Confinement,
    max_chars: usize,
}

impl Search {
    pub fn new(confinement: Confinement) -> Self {
        Self {
            confinement,
            max_chars: SEARCH_MAX_CHARS,
        }
    }

    pub fn max_chars(mut self, max: usize) -> Self {
        self.max_chars = max;
        self
    }
}

impl Tool for Search {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::SEARCH)
            .purpose("Search file contents recursively for a pattern")
            .when_to_use(
                "When you need to find where a symbol, string or pattern appears in the project",
            )
            .when_not_to_use(
                "When you already know the file and need all of it, use read_file instead",
            )
            .parameters_for::<SearchArgs>()
            .example(
                "search(pattern='fn main', path='src')",
                "src/main.rs:12:fn main() {",
            )
            .output_format("Matching lines as path:line:text, one per line")
            .disambiguate(
                "Need the full content of one file",
                names::READ_FILE,
                "read_file returns the whole file instead of matching lines",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: SearchArgs = parse_tool_args(names::SEARCH, &arguments)?;
            let requested = args.path.unwrap_or_else(|| ".".to_string());
            let full_path = self.confinement.resolve(&requested)?;
            if !full_path.exists() {
                return Err(ToolError::NotFound { path: requested });
            }
            let target = self.confinement.display(&full_path);

            let output = run_process(
                Command::new("grep")
                    .args(["-rns", "--color=never", "-e", args.pattern.as_str()])
                    .args(["--", target.as_str()])
                    .current_dir(self.confinement.root()),
                "grep",
                None,
            )
            .await?;

            search_outcome(
                output.status.code(),
                &output.stdout,
                &output.stderr,
                &args.pattern,
                &target,
                self.max_chars,
            )
        })
    }
}

/// Interpret a `grep` exit status.
///
/// Status 2 means some file could not be read. Matches found elsewhere are
/// still returned; only a status 2 with no output is a failure.
fn search_outcome(
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
    pattern: &str,
    target: &str,
    max_chars: usize,
) -> Result<String, ToolError> {
    match code {
        Some(0) => Ok(truncate_chars(
            String::from_utf8_lossy(stdout).into_owned(),
            max_chars,
        )),
        Some(2) if !stdout.is_empty() => {
            debug!("[search] grep skipped unreadable files under {target}");
            Ok(truncate_chars(
                String::from_utf8_lossy(stdout).into_owned(),
                max_chars,
            ))
        }
        Some(1) => Ok(format!("No matches found for '{pattern}' in {target}")),
        code => Err(ToolError::CommandFailed {
            code: code.unwrap_or(-1),
            output: String::from_utf8_lossy(stderr).into_owned(),
        }),
    }
}

// ── Shell ───────────────────────────────────────────────────────────

/// Run a shell command (`sh -c`) in the working directory.
///
/// Both output streams are captured. A non-zero exit is reported as an
/// error result carrying the exit code and the captured output.
pub struct Shell {
    confinement: Confinement,
    timeout: Option<Duration>,
}

impl Shell {
    pub fn new(confinement: Confinement) -> Self {
        Self {
            confinement,
            timeout: None,
        }
    }

    /// Kill the command if it runs longer than `timeout`. `None` waits
    /// for completion.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Tool for Shell {
    fn is_mutation(&self) -> bool {
        true
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::SHELL)
            .purpose("Execute a shell command in the working directory")
            .when_to_use(
                "When you need to build, run tests, inspect git state or run any other \
                 command-line program",
            )
            .when_not_to_use(
                "When reading or editing files, use read_file, write_file or edit_file, \
                 which report clearer errors",
            )
            .parameters_for::<ShellArgs>()
            .example("shell(command='git status --short')", " M src/lib.rs")
            .output_format("stdout, followed by stderr under a [stderr] marker when present")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: ShellArgs = parse_tool_args(names::SHELL, &arguments)?;
            let output = run_process(
                Command::new("sh")
                    .arg("-c")
                    .arg(&args.command)
                    .current_dir(self.confinement.root()),
                "sh",
                self.timeout,
            )
            .await?;

            let text = combine_streams(&output);
            if output.status.success() {
                Ok(text)
            } else {
                Err(ToolError::CommandFailed {
                    code: output.status.code().unwrap_or(-1),
                    output: text,
                })
            }
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Fail with `NotFound` or `IsDirectory` unless `full_path` is a regular file.
async fn require_file(full_path: &Path, requested: &str) -> Result<(), ToolError> {
    match fs::metadata(full_path).await {
        Ok(meta) if meta.is_dir() => Err(ToolError::IsDirectory {
            path: requested.to_string(),
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::NotFound {
            path: requested.to_string(),
        }),
        Err(e) => Err(ToolError::io("cannot stat", full_path, e)),
    }
}

/// Run `command` to completion, capturing both streams.
pub async fn run_process(
    command: &mut Command,
    program: &str,
    timeout: Option<Duration>,
) -> Result<Output, ToolError> {
    command.kill_on_drop(true);
    let spawn_err = |source| ToolError::Spawn {
        program: program.to_string(),
        source,
    };

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool: program.to_string(),
                secs: limit.as_secs(),
            })?
            .map_err(spawn_err)?,
        None => command.output().await.map_err(spawn_err)?,
    };
    debug!("[sandbox] {program} exited with {}", output.status);
    Ok(output)
}

/// stdout, then stderr under a `[stderr]` marker when non-empty.
fn combine_streams(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => "(no output)".to_string(),
        (false, true) => stdout.into_owned(),
        (true, false) => format!("[stderr]\n{stderr}"),
        (false, false) => format!("{stdout}\n[stderr]\n{stderr}"),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
