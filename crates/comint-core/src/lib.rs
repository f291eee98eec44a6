//! Core terminal-session engine: a PTY-backed shell process streamed through
//! a position-tracking text buffer, with input history recall and a
//! sentinel-framed shell-completion handshake.

mod buffer;
mod complete;
mod config;
mod error;
pub mod logging;
mod pipeline;
mod pty;
mod ring;
mod session;

pub use buffer::{SessionBuffer, TextBuffer};
pub use complete::{CompletionRequest, INTERRUPT};
pub use config::Config;
pub use error::ComintError;
pub use pipeline::{HandlerFlow, OutputHandler, OutputPipeline};
pub use pty::{PtyEvent, PtyProcess, PtyWriter};
pub use ring::HistoryRing;
pub use session::{Session, SessionRegistry};

/// Result type for comint operations.
pub type Result<T> = std::result::Result<T, ComintError>;
