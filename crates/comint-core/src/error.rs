//! Error types for comint.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComintError {
    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("Process has exited")]
    ProcessExited,

    #[error("Completion request timed out")]
    CompletionTimeout,

    #[error("Completion request aborted before the shell responded")]
    CompletionAborted,

    #[error("A completion request is already in flight")]
    CompletionInFlight,

    #[error("Invalid prompt pattern: {0}")]
    InvalidPromptPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
