//! Completion candidate types.

use serde::{Deserialize, Serialize};

/// One shell-completion candidate recovered from the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The completion word produced by the shell.
    pub text: String,
    /// The last whitespace-delimited token of the command the request was
    /// made against; hosts replace this token with `text` on acceptance.
    pub replacement_prefix: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, replacement_prefix: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            replacement_prefix: replacement_prefix.into(),
        }
    }
}
