//! Canonical tool name constants.
//!
//! All tool-name string literals (stance allow-lists, tracker read/write
//! sets, tool definitions) reference these constants so a rename only
//! touches this file.

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const EDIT_FILE: &str = "edit_file";
pub const LIST_DIR: &str = "list_dir";
pub const SEARCH: &str = "search";
pub const SHELL: &str = "shell";

/// Every tool the sandbox declares, in declaration order.
pub const ALL: &[&str] = &[READ_FILE, WRITE_FILE, EDIT_FILE, LIST_DIR, SEARCH, SHELL];
