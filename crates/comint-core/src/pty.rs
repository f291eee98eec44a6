//! PTY process supervision for the shell backing a session.

use crate::{ComintError, Result};
use comint_types::SpawnSpec;
use portable_pty::{native_pty_system, Child as PtyChild, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the supervised process, delivered over the session's
/// event channel so all buffer mutation happens on one logical thread.
#[derive(Debug)]
pub enum PtyEvent {
    /// Raw output chunk, UTF-8 decoded (lossy). Chunk boundaries are
    /// arbitrary; the OS layer guarantees no framing.
    Data(String),
    /// The child terminated for any reason.
    Exited { exit_code: Option<i32> },
}

/// Clonable fire-and-forget write handle to the child's input stream.
///
/// Write failures (e.g. the process already died) are logged and swallowed;
/// the user-visible signal for a dead shell is the `Exited` event.
#[derive(Clone)]
pub struct PtyWriter {
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl PtyWriter {
    pub(crate) fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    pub fn write(&self, bytes: &[u8]) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(writer) => {
                if let Err(e) = writer.write_all(bytes).and_then(|_| writer.flush()) {
                    warn!(target: "comint::pty", "Dropping {} bytes of input: {}", bytes.len(), e);
                }
            }
            None => {
                warn!(target: "comint::pty", "Dropping {} bytes of input: process is gone", bytes.len());
            }
        }
    }

    /// Close the underlying fd. Later writes are logged and dropped.
    fn close(&self) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }
}

/// A shell process bound to a pseudo-terminal.
///
/// Owns one OS process and one PTY device. The reader runs on a dedicated
/// thread (PTY reads are blocking) and forwards chunks over the event
/// channel given at spawn time.
pub struct PtyProcess {
    writer: PtyWriter,
    master: Option<Box<dyn MasterPty + Send>>,
    child: Arc<Mutex<Box<dyn PtyChild + Send + Sync>>>,
    shutdown: Arc<AtomicBool>,
    killed: bool,
}

impl PtyProcess {
    /// Spawn the command behind a new PTY and start streaming its output
    /// into `event_tx`. Spawn failure is fatal to the session; there are no
    /// retries.
    pub fn spawn(spec: &SpawnSpec, event_tx: mpsc::UnboundedSender<PtyEvent>) -> Result<Self> {
        if !spec.working_directory.is_dir() {
            error!(
                target: "comint::pty",
                "Working directory does not exist: {:?}", spec.working_directory
            );
            return Err(ComintError::SpawnFailed(format!(
                "Working directory does not exist: {:?}",
                spec.working_directory
            )));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.columns,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ComintError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&spec.command);
        cmd.args(&spec.args);
        cmd.cwd(&spec.working_directory);
        // Escape codes are stripped, not rendered, so ask for as few as
        // possible.
        cmd.env("TERM", "dumb");

        info!(
            target: "comint::pty",
            "Spawning {:?} {:?} in {:?} ({}x{})",
            spec.command, spec.args, spec.working_directory, spec.columns, spec.rows
        );

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ComintError::SpawnFailed(e.to_string()))?;
        let child: Arc<Mutex<Box<dyn PtyChild + Send + Sync>>> = Arc::new(Mutex::new(child));

        let shutdown = Arc::new(AtomicBool::new(false));

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ComintError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ComintError::Pty(e.to_string()))?;

        let shutdown_for_thread = shutdown.clone();
        let child_for_thread = child.clone();

        // Reader thread (PTY reading is blocking).
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            debug!(target: "comint::pty", "Reader thread started");

            loop {
                if shutdown_for_thread.load(Ordering::SeqCst) {
                    debug!(target: "comint::pty", "Reader thread received shutdown signal");
                    return;
                }

                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!(target: "comint::pty", "Reader got EOF");
                        break;
                    }
                    Ok(n) => {
                        // A chunk racing a kill is dropped, never delivered.
                        if shutdown_for_thread.load(Ordering::SeqCst) {
                            return;
                        }
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        trace!(
                            target: "comint::pty",
                            "Output chunk ({} bytes): {:?}",
                            n,
                            chunk.chars().take(80).collect::<String>()
                        );
                        if event_tx.send(PtyEvent::Data(chunk)).is_err() {
                            debug!(target: "comint::pty", "Event channel closed, reader exiting");
                            return;
                        }
                    }
                    Err(e) => {
                        if !shutdown_for_thread.load(Ordering::SeqCst) {
                            error!(target: "comint::pty", "PTY read error: {}", e);
                        }
                        break;
                    }
                }
            }

            if shutdown_for_thread.load(Ordering::SeqCst) {
                return;
            }

            let exit_code = {
                let mut child = match child_for_thread.lock() {
                    Ok(child) => child,
                    Err(poisoned) => poisoned.into_inner(),
                };
                child.wait().ok().map(|status| status.exit_code() as i32)
            };
            info!(target: "comint::pty", "Child exited with code {:?}", exit_code);
            let _ = event_tx.send(PtyEvent::Exited { exit_code });
        });

        Ok(Self {
            writer: PtyWriter::new(writer),
            master: Some(pair.master),
            child,
            shutdown,
            killed: false,
        })
    }

    /// Send raw bytes to the child's input stream. Fire-and-forget; no
    /// backpressure beyond OS buffering.
    pub fn write(&self, bytes: &[u8]) {
        self.writer.write(bytes);
    }

    /// Get a clonable write handle (used by diverted output handlers that
    /// need to answer the shell mid-stream).
    pub fn writer(&self) -> PtyWriter {
        self.writer.clone()
    }

    /// Terminate the child and release the PTY. Idempotent: a second call is
    /// a no-op. Output chunks racing this call are silently dropped.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        info!(target: "comint::pty", "Killing shell process");
        self.shutdown.store(true, Ordering::SeqCst);

        let pid = {
            let mut child = match self.child.lock() {
                Ok(child) => child,
                Err(poisoned) => poisoned.into_inner(),
            };
            let pid = child.process_id();
            let _ = child.kill();
            pid
        };

        // A login shell may have spawned its own children; take the whole
        // process group down with it.
        #[cfg(unix)]
        if let Some(pid) = pid {
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        // Close our side of the PTY to unblock the reader thread.
        self.writer.close();
        self.master.take();

        // Reap the zombie.
        if let Ok(mut child) = self.child.lock() {
            let _ = child.try_wait();
        }
    }

    /// Whether `kill` has been called.
    pub fn is_killed(&self) -> bool {
        self.killed
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
