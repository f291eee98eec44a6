//! Session orchestration: one shell process behind a PTY, one text buffer,
//! one history ring, one output pipeline.
//!
//! All buffer mutation funnels through a single logical thread of control:
//! the host drives `pump`/`apply` for process output and calls the command
//! methods for user actions, so no locking is needed around buffer state.

use crate::complete::{self, CompletionRequest, INTERRUPT, LIST_COMPLETIONS, SENTINEL};
use crate::{
    ComintError, Config, HistoryRing, OutputPipeline, PtyEvent, PtyProcess, Result, SessionBuffer,
};
use comint_types::SessionStatus;
use regex::Regex;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A live terminal session.
pub struct Session {
    id: Uuid,
    buffer: SessionBuffer,
    ring: HistoryRing,
    pipeline: OutputPipeline,
    pty: PtyProcess,
    events: mpsc::UnboundedReceiver<PtyEvent>,
    status: SessionStatus,
}

impl Session {
    /// Spawn the configured shell and wire up the session around it.
    pub fn spawn(config: &Config) -> Result<Self> {
        let prompt_regex = Regex::new(&config.prompt_regex)?;
        let (event_tx, events) = mpsc::unbounded_channel();
        let pty = PtyProcess::spawn(&config.spawn_spec(), event_tx)?;

        let id = Uuid::new_v4();
        info!(target: "comint::session", "Session {} started", id);

        Ok(Self {
            id,
            buffer: SessionBuffer::new(prompt_regex),
            ring: HistoryRing::new(config.history_capacity),
            pipeline: OutputPipeline::new(OutputPipeline::renderer()),
            pty,
            events,
            status: SessionStatus::Starting,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn buffer(&self) -> &SessionBuffer {
        &self.buffer
    }

    /// Buffer access for the host's typing and caret-movement paths.
    pub fn buffer_mut(&mut self) -> &mut SessionBuffer {
        &mut self.buffer
    }

    pub fn history(&self) -> &HistoryRing {
        &self.ring
    }

    /// Wait for the next process event. `None` means the event channel is
    /// closed and no more output will ever arrive.
    pub async fn next_event(&mut self) -> Option<PtyEvent> {
        self.events.recv().await
    }

    /// Apply one process event to session state.
    pub fn apply(&mut self, event: PtyEvent) {
        match event {
            PtyEvent::Data(chunk) => {
                if self.status == SessionStatus::Exited {
                    debug!(
                        target: "comint::session",
                        "Dropping {} bytes delivered after teardown", chunk.len()
                    );
                    return;
                }
                if self.status == SessionStatus::Starting {
                    self.status = SessionStatus::Active;
                }
                self.pipeline.dispatch(&mut self.buffer, &chunk);
            }
            PtyEvent::Exited { exit_code } => {
                info!(
                    target: "comint::session",
                    "Session {} process exited with code {:?}", self.id, exit_code
                );
                self.teardown();
            }
        }
    }

    /// Wait for and apply the next event. Returns false once the process is
    /// gone and the channel is drained.
    pub async fn pump(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Take the current command from the buffer and submit it to the shell.
    ///
    /// Any in-progress history recall is popped first; non-empty lines are
    /// committed to history. A newline is rendered locally so prompt spacing
    /// stays consistent before the process echoes anything back.
    pub fn submit(&mut self) {
        let line = self.buffer.current_command(true);
        self.ring.pop_and_reset();
        if !line.is_empty() {
            self.ring.push(&line);
        }
        debug!(target: "comint::session", "Submitting {:?}", line);
        self.pty.write(format!("{}\n", line).as_bytes());
        self.buffer.render("\n");
    }

    /// Replace the in-progress line with the previous history entry.
    pub fn recall_previous(&mut self) {
        let text = self.ring.previous();
        self.buffer.insert_recalled(&text);
    }

    /// Replace the in-progress line with the next history entry.
    pub fn recall_next(&mut self) {
        let text = self.ring.next();
        self.buffer.insert_recalled(&text);
    }

    /// Erase rendered output above the caret's row.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Move the caret to the start of the editable line, skipping a
    /// detected prompt.
    pub fn jump_to_line_start(&mut self) {
        self.buffer.jump_to_line_start();
    }

    /// Send Ctrl-C to the foreground process.
    pub fn send_interrupt(&self) {
        self.pty.write(&[INTERRUPT]);
    }

    /// Start a completion exchange for the command being composed.
    ///
    /// Diverts the output stream into a collector, then drives the shell's
    /// list-completions key with a sentinel line to frame the reply. The
    /// caller awaits the returned request with a timeout of its choosing and
    /// must call `abort_completion` if it gives up.
    pub fn request_completion(&mut self) -> Result<CompletionRequest> {
        if self.status == SessionStatus::Exited {
            return Err(ComintError::ProcessExited);
        }
        if self.pipeline.is_diverted() {
            return Err(ComintError::CompletionInFlight);
        }

        let context = self.buffer.current_command(false);
        debug!(target: "comint::session", "Requesting completions for {:?}", context);

        let (tx, rx) = oneshot::channel();
        self.pipeline
            .divert(complete::collector(context.clone(), self.pty.writer(), tx));

        self.pty.write(context.as_bytes());
        self.pty.write(LIST_COMPLETIONS);
        self.pty.write(SENTINEL.as_bytes());
        self.pty.write(b"\n");

        Ok(CompletionRequest::new(rx))
    }

    /// Whether a completion exchange currently owns the output stream.
    pub fn completion_in_flight(&self) -> bool {
        self.pipeline.is_diverted()
    }

    /// Give up on an in-flight completion exchange and hand the output
    /// stream back to the renderer. Must be called on timeout; harmless when
    /// no exchange is in flight.
    pub fn abort_completion(&mut self) {
        if self.pipeline.is_diverted() {
            warn!(target: "comint::session", "Aborting in-flight completion exchange");
            self.pipeline.restore();
        }
    }

    /// Terminate the shell and tear the session down. Idempotent; chunks
    /// still in flight when this returns are dropped without touching the
    /// buffer.
    pub fn kill(&mut self) {
        info!(target: "comint::session", "Session {} killed", self.id);
        self.teardown();
    }

    fn teardown(&mut self) {
        // An exchange can never complete once the process is gone; dropping
        // the collector resolves its requester with an abort.
        self.pipeline.restore();
        self.status = SessionStatus::Exited;
        self.pty.kill();
    }
}

/// The set of live sessions a host is managing.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) -> Uuid {
        let id = session.id();
        self.sessions.insert(id, session);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Kill every session; used on host deactivation.
    pub fn dispose_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.kill();
        }
        self.sessions.clear();
    }
}
