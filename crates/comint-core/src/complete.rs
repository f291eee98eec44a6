//! Sentinel-framed shell-completion handshake.
//!
//! There is no side-channel API for completions: the shell's own
//! list-completions key is driven over the PTY and the response is recovered
//! from the raw output stream. The exchange diverts the output pipeline into
//! a collector, frames the shell's reply between two sentinels, and restores
//! the renderer when the echo artifacts have been cleaned up:
//!
//! `idle -> accumulating -> terminating -> idle`

use crate::buffer::SessionBuffer;
use crate::pipeline::{HandlerFlow, OutputHandler};
use crate::pty::PtyWriter;
use crate::{ComintError, Result};
use comint_types::Suggestion;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Interrupt the foreground process (Ctrl-C).
pub const INTERRUPT: u8 = 0x03;
/// Discard the shell's current input line (Ctrl-U).
pub(crate) const KILL_LINE: u8 = 0x15;
/// Readline's list-completions request (ESC *).
pub(crate) const LIST_COMPLETIONS: &[u8] = &[0x1b, 0x2a];
/// Erase-without-echo correction for the sentinel artifact (ESC BS).
pub(crate) const ERASE_CORRECTION: &[u8] = &[0x1b, 0x08];

/// First-stage sentinel, typed as an input line after the completion
/// request; its echo marks the end of the candidate list.
pub(crate) const SENTINEL: &str = "~~~";
/// Second-stage sentinel byte, sent to flush the shell's redraw.
pub(crate) const SENTINEL_BYTE: u8 = b'~';

enum Phase {
    Accumulating,
    Terminating,
}

/// Pending side of an in-flight completion exchange.
///
/// The protocol imposes no timeout of its own; a shell that never echoes the
/// sentinel leaves the exchange hanging. Await with `resolve`, and abort the
/// session's exchange (restoring its output handler) on elapse.
pub struct CompletionRequest {
    rx: oneshot::Receiver<Vec<Suggestion>>,
}

impl CompletionRequest {
    pub(crate) fn new(rx: oneshot::Receiver<Vec<Suggestion>>) -> Self {
        Self { rx }
    }

    /// Wait for the shell's reply, up to `timeout`.
    pub async fn resolve(self, timeout: Duration) -> Result<Vec<Suggestion>> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(suggestions)) => Ok(suggestions),
            Ok(Err(_)) => Err(ComintError::CompletionAborted),
            Err(_) => Err(ComintError::CompletionTimeout),
        }
    }
}

/// Build the collector handler that is swapped in for the duration of one
/// exchange. It never touches the session buffer; the diverted chunks are
/// consumed here and the renderer resumes untouched afterwards.
pub(crate) fn collector(
    context: String,
    writer: PtyWriter,
    resolve: oneshot::Sender<Vec<Suggestion>>,
) -> OutputHandler {
    let mut phase = Phase::Accumulating;
    let mut accumulated = String::new();
    let mut resolve = Some(resolve);

    Box::new(move |_buffer: &mut SessionBuffer, chunk: &str| {
        match phase {
            Phase::Accumulating => {
                accumulated.push_str(chunk);
                trace!(
                    target: "comint::complete",
                    "Accumulated {} bytes awaiting sentinel",
                    accumulated.len()
                );
                if accumulated.trim_end().ends_with(SENTINEL) {
                    debug!(target: "comint::complete", "Sentinel observed, terminating exchange");
                    // Throw away the sentinel input line the shell is still
                    // holding, and flush its redraw with a single marker.
                    writer.write(&[KILL_LINE]);
                    writer.write(&[SENTINEL_BYTE]);

                    let suggestions = parse_candidates(&accumulated, &context);
                    if let Some(tx) = resolve.take() {
                        if tx.send(suggestions).is_err() {
                            warn!(target: "comint::complete", "Completion requester went away");
                        }
                    }
                    phase = Phase::Terminating;
                }
                HandlerFlow::Continue
            }
            Phase::Terminating => {
                if chunk.bytes().any(|b| b == SENTINEL_BYTE) {
                    debug!(target: "comint::complete", "Redraw flushed, handing stream back");
                    writer.write(ERASE_CORRECTION);
                    HandlerFlow::Restore
                } else {
                    HandlerFlow::Continue
                }
            }
        }
    })
}

/// Extract completion candidates from the accumulated exchange text.
///
/// The text contains the echoed context command, the shell's candidate
/// words, and the echoed sentinel. Carriage-return artifacts are stripped,
/// the text is shell-tokenized, and as many leading tokens as the context
/// command had are dropped so only newly produced words remain.
fn parse_candidates(raw: &str, context: &str) -> Vec<Suggestion> {
    let cleaned = raw.replace('\r', "");
    let cleaned = cleaned.trim_end();
    let cleaned = cleaned.strip_suffix(SENTINEL).unwrap_or(cleaned);

    let context_tokens = tokenize(context).len();
    let prefix = context.split_whitespace().last().unwrap_or("").to_string();

    tokenize(cleaned)
        .into_iter()
        .skip(context_tokens)
        .map(|token| Suggestion::new(token, prefix.clone()))
        .collect()
}

/// Shell tokenization with a plain-whitespace fallback for text the shell
/// echoed with unbalanced quoting.
fn tokenize(text: &str) -> Vec<String> {
    shell_words::split(text)
        .unwrap_or_else(|_| text.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputPipeline;
    use regex::Regex;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session_buffer() -> SessionBuffer {
        SessionBuffer::new(Regex::new(r"^[^#$%>\n]*[#$%>] *").unwrap())
    }

    #[test]
    fn test_parse_candidates_drops_context_echo() {
        let raw = "ls /us\r\n/usr/  /usr/local/\r\n~~~";
        let suggestions = parse_candidates(raw, "ls /us");
        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("/usr/", "/us"),
                Suggestion::new("/usr/local/", "/us"),
            ]
        );
    }

    #[test]
    fn test_parse_candidates_empty_reply() {
        let raw = "ls /nowhere\r\n~~~";
        assert!(parse_candidates(raw, "ls /nowhere").is_empty());
    }

    #[test]
    fn test_parse_candidates_keeps_terminator_lookalike_candidates() {
        // only the trailing terminator line is framing; a candidate that
        // happens to spell the same bytes is real output
        let raw = "ls ~\r\n~~~ ~~~x\r\n~~~";
        let suggestions = parse_candidates(raw, "ls ~");
        assert_eq!(
            suggestions,
            vec![Suggestion::new("~~~", "~"), Suggestion::new("~~~x", "~")]
        );
    }

    #[test]
    fn test_parse_candidates_bare_command() {
        let raw = "gi\r\ngit  gitk\r\n~~~";
        let suggestions = parse_candidates(raw, "gi");
        assert_eq!(
            suggestions,
            vec![Suggestion::new("git", "gi"), Suggestion::new("gitk", "gi")]
        );
    }

    #[tokio::test]
    async fn test_collector_full_exchange() {
        let sink = SharedSink::default();
        let writer = PtyWriter::new(Box::new(sink.clone()));
        let (tx, rx) = oneshot::channel();

        let mut pipeline = OutputPipeline::new(OutputPipeline::renderer());
        let mut buffer = session_buffer();
        pipeline.divert(collector("ls /us".to_string(), writer, tx));

        // the shell echoes the context, then the candidates, then our
        // sentinel line, split across arbitrary chunk boundaries
        pipeline.dispatch(&mut buffer, "ls /us\r\n/usr/  /usr");
        pipeline.dispatch(&mut buffer, "/local/\r\n~~");
        pipeline.dispatch(&mut buffer, "~\r\n");

        let suggestions = CompletionRequest::new(rx)
            .resolve(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].text, "/usr/");
        assert_eq!(suggestions[1].text, "/usr/local/");
        assert!(suggestions.iter().all(|s| s.replacement_prefix == "/us"));

        // first-stage teardown bytes went to the shell
        assert_eq!(sink.bytes(), vec![KILL_LINE, SENTINEL_BYTE]);
        assert!(pipeline.is_diverted());

        // second-stage sentinel flushes the redraw and hands the stream back
        pipeline.dispatch(&mut buffer, "~");
        assert!(!pipeline.is_diverted());
        let bytes = sink.bytes();
        assert_eq!(&bytes[bytes.len() - 2..], ERASE_CORRECTION);

        // nothing was rendered while diverted
        assert_eq!(buffer.text().text(), "");
    }

    #[tokio::test]
    async fn test_collector_drop_aborts_request() {
        let sink = SharedSink::default();
        let writer = PtyWriter::new(Box::new(sink));
        let (tx, rx) = oneshot::channel();

        let mut pipeline = OutputPipeline::new(OutputPipeline::renderer());
        pipeline.divert(collector("ls".to_string(), writer, tx));
        // timeout path: the caller gives up and restores the handler,
        // dropping the collector and its sender with it
        pipeline.restore();

        let err = CompletionRequest::new(rx)
            .resolve(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ComintError::CompletionAborted));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let (_tx, rx) = oneshot::channel();
        let err = CompletionRequest::new(rx)
            .resolve(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ComintError::CompletionTimeout));
    }
}
