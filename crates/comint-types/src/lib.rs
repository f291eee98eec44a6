//! Shared types for the comint terminal-session engine.

mod complete;
mod geometry;
mod session;

pub use complete::*;
pub use geometry::*;
pub use session::*;
