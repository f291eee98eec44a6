//! Output interception pipeline: a single swappable handler slot between
//! the PTY supervisor and the session buffer.
//!
//! The handler is a first-class function value, not a trait hierarchy. The
//! renderer is bound at session start; the completion handshake temporarily
//! diverts the stream into a collector and hands it back when done. The
//! session event loop is the only caller of `dispatch`, so a swap can never
//! split a chunk across two handlers.

use crate::buffer::SessionBuffer;
use tracing::{debug, trace};

/// What the active handler wants done after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    /// Keep the current handler bound.
    Continue,
    /// Reinstate the previously saved handler before the next chunk.
    Restore,
}

/// The single active consumer of process output.
pub type OutputHandler = Box<dyn FnMut(&mut SessionBuffer, &str) -> HandlerFlow + Send>;

pub struct OutputPipeline {
    active: OutputHandler,
    saved: Option<OutputHandler>,
}

impl OutputPipeline {
    /// Create a pipeline with the given initial handler bound.
    pub fn new(initial: OutputHandler) -> Self {
        Self {
            active: initial,
            saved: None,
        }
    }

    /// The normal binding: render every chunk into the session buffer.
    pub fn renderer() -> OutputHandler {
        Box::new(|buffer, chunk| {
            buffer.render(chunk);
            HandlerFlow::Continue
        })
    }

    /// Feed one chunk to whichever handler is currently bound.
    pub fn dispatch(&mut self, buffer: &mut SessionBuffer, chunk: &str) {
        trace!(target: "comint::pipeline", "Dispatching {} bytes", chunk.len());
        match (self.active)(buffer, chunk) {
            HandlerFlow::Continue => {}
            HandlerFlow::Restore => self.restore(),
        }
    }

    /// Save the active handler and bind `handler` in its place. Only the
    /// completion handshake (and session construction) may do this; the
    /// caller is responsible for an eventual `restore`.
    pub fn divert(&mut self, handler: OutputHandler) {
        debug!(target: "comint::pipeline", "Diverting output stream");
        let previous = std::mem::replace(&mut self.active, handler);
        debug_assert!(self.saved.is_none(), "output stream diverted twice");
        self.saved = Some(previous);
    }

    /// Reinstate the saved handler. No-op when nothing is saved.
    pub fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            debug!(target: "comint::pipeline", "Restoring previous output handler");
            self.active = saved;
        }
    }

    /// Whether the stream is currently diverted away from its saved handler.
    pub fn is_diverted(&self) -> bool {
        self.saved.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_buffer() -> SessionBuffer {
        SessionBuffer::new(Regex::new(r"^[^#$%>\n]*[#$%>] *").unwrap())
    }

    fn counting_handler(count: Arc<AtomicUsize>, flow: HandlerFlow) -> OutputHandler {
        Box::new(move |_buffer, _chunk| {
            count.fetch_add(1, Ordering::SeqCst);
            flow
        })
    }

    #[test]
    fn test_dispatch_goes_to_active_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut pipeline = OutputPipeline::new(counting_handler(count.clone(), HandlerFlow::Continue));
        let mut buffer = test_buffer();

        pipeline.dispatch(&mut buffer, "one");
        pipeline.dispatch(&mut buffer, "two");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_divert_and_restore_round_trip() {
        let renderer_count = Arc::new(AtomicUsize::new(0));
        let collector_count = Arc::new(AtomicUsize::new(0));
        let mut pipeline =
            OutputPipeline::new(counting_handler(renderer_count.clone(), HandlerFlow::Continue));
        let mut buffer = test_buffer();

        pipeline.divert(counting_handler(collector_count.clone(), HandlerFlow::Continue));
        assert!(pipeline.is_diverted());

        pipeline.dispatch(&mut buffer, "captured");
        assert_eq!(renderer_count.load(Ordering::SeqCst), 0);
        assert_eq!(collector_count.load(Ordering::SeqCst), 1);

        pipeline.restore();
        assert!(!pipeline.is_diverted());
        pipeline.dispatch(&mut buffer, "normal");
        assert_eq!(renderer_count.load(Ordering::SeqCst), 1);
        assert_eq!(collector_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_request_its_own_restore() {
        let renderer_count = Arc::new(AtomicUsize::new(0));
        let mut pipeline =
            OutputPipeline::new(counting_handler(renderer_count.clone(), HandlerFlow::Continue));
        let mut buffer = test_buffer();

        pipeline.divert(Box::new(|_buffer, _chunk| HandlerFlow::Restore));
        pipeline.dispatch(&mut buffer, "last diverted chunk");
        assert!(!pipeline.is_diverted());

        pipeline.dispatch(&mut buffer, "back to normal");
        assert_eq!(renderer_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restore_without_divert_is_a_noop() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut pipeline = OutputPipeline::new(counting_handler(count.clone(), HandlerFlow::Continue));
        let mut buffer = test_buffer();

        pipeline.restore();
        pipeline.restore();
        pipeline.dispatch(&mut buffer, "still works");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
