//! Session lifecycle and spawn parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session status in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Shell process is starting.
    Starting,
    /// Session is live and exchanging data with the shell.
    Active,
    /// Shell process has terminated (normal exit, signal, or kill).
    Exited,
}

/// Parameters for spawning the PTY-backed shell process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Executable to run (e.g. "bash").
    pub command: String,
    /// Arguments, in order (e.g. ["-l"]).
    pub args: Vec<String>,
    /// Working directory the process starts in.
    pub working_directory: PathBuf,
    /// Terminal width in columns.
    pub columns: u16,
    /// Terminal height in rows.
    pub rows: u16,
}
