//! The session task and its public handle.
//!
//! All graph mutation is confined to one task per session, because the
//! underlying hardware session forbids concurrent configuration. Commands
//! arrive on an inbound channel; hardware completions arrive on their own
//! channel and are correlated with pending requests on the same task, so the
//! correlation table is single-writer by construction.

use crate::backend::{CompletionEvent, SessionBackend};
use crate::config::CaptureConfig;
use crate::errors::SessionError;
use crate::output::{CorrelationKey, CorrelationTable, OutputController};
use crate::session::catalog::DeviceCatalog;
use crate::session::graph::{OutputSinks, SessionGraph};
use crate::session::observer::RunningStateObserver;
use crate::types::{PhotoArtifact, PreviewUpdate, SinkConfig};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;
type PhotoReceiver = oneshot::Receiver<Result<PhotoArtifact, SessionError>>;
type RecordingReceiver = oneshot::Receiver<Result<PathBuf, SessionError>>;

enum Command {
    Apply(Vec<SinkConfig>, Reply<()>),
    Start(Reply<()>),
    Stop(Reply<()>),
    CapturePhoto(Reply<PhotoReceiver>),
    StartRecording(Reply<RecordingReceiver>),
    StopRecording(Reply<()>),
}

/// Outbound notifications to the presentation layer.
pub struct SessionEvents {
    /// Per-preview-slot notifications carrying the live low-level handle, or
    /// `None` when the slot was unwired.
    pub previews: mpsc::UnboundedReceiver<PreviewUpdate>,
    /// De-duplicated transitions of the session's running flag.
    pub running: mpsc::UnboundedReceiver<bool>,
}

/// Entry point: opens a capture session over a backend.
pub struct CaptureSession;

impl CaptureSession {
    /// Spawn the session task over `backend` and return the caller-facing
    /// handle plus the outbound event channels.
    ///
    /// `completions` is the channel the backend delivers hardware completions
    /// on; it is drained exclusively by the session task. Must be called from
    /// within a tokio runtime.
    pub fn open<B: SessionBackend>(
        mut backend: B,
        completions: mpsc::UnboundedReceiver<CompletionEvent>,
        config: CaptureConfig,
    ) -> (SessionHandle, SessionEvents) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (preview_tx, preview_rx) = mpsc::unbounded_channel();
        let (running_tx, running_rx) = mpsc::unbounded_channel();

        let outputs = OutputController::new(&mut backend);
        let observer = RunningStateObserver::spawn(backend.running(), running_tx);

        let task = SessionTask {
            backend,
            catalog: DeviceCatalog::new(),
            graph: SessionGraph::new(),
            outputs,
            table: CorrelationTable::new(),
            config,
            preview_tx,
            _observer: observer,
            started: false,
        };
        tokio::spawn(task.run(command_rx, completions));

        (
            SessionHandle {
                commands: command_tx,
            },
            SessionEvents {
                previews: preview_rx,
                running: running_rx,
            },
        )
    }
}

/// Clonable handle to a running session task.
///
/// When the last handle is dropped the task tears down: pending capture and
/// recording requests resolve with `Cancelled`, and a running session is
/// stopped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Push a full desired-configuration list; the session graph is mutated
    /// to match it with minimal churn. Applying the same list twice is a
    /// no-op on the graph.
    pub async fn apply(&self, configs: Vec<SinkConfig>) -> Result<(), SessionError> {
        self.request(|reply| Command::Apply(configs, reply)).await?
    }

    /// Start the session running. Blocking on the session task; expect
    /// multi-tens-of-milliseconds latency.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await?
    }

    /// Stop the session. Blocking on the session task.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(Command::Stop).await?
    }

    /// Capture one photo from the currently wired photo sink and await the
    /// image.
    pub async fn capture_photo(&self) -> Result<PhotoArtifact, SessionError> {
        let pending = self.request(Command::CapturePhoto).await??;
        pending.await.map_err(|_| SessionError::Cancelled)?
    }

    /// Begin a recording. The returned [`ActiveRecording`] resolves with the
    /// finished file's location once the hardware finalizes it, typically
    /// after [`SessionHandle::stop_recording`].
    pub async fn start_recording(&self) -> Result<ActiveRecording, SessionError> {
        let pending = self.request(Command::StartRecording).await??;
        Ok(ActiveRecording { pending })
    }

    /// Ask the hardware to finalize the active recording. No-op when nothing
    /// is recording.
    pub async fn stop_recording(&self) -> Result<(), SessionError> {
        self.request(Command::StopRecording).await?
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<Result<T, SessionError>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }
}

/// A recording in progress. Await [`ActiveRecording::finished`] for the
/// finalized file's location.
#[derive(Debug)]
pub struct ActiveRecording {
    pending: RecordingReceiver,
}

impl ActiveRecording {
    pub async fn finished(self) -> Result<PathBuf, SessionError> {
        self.pending.await.map_err(|_| SessionError::Cancelled)?
    }
}

struct SessionTask<B: SessionBackend> {
    backend: B,
    catalog: DeviceCatalog,
    graph: SessionGraph,
    outputs: OutputController,
    table: CorrelationTable,
    config: CaptureConfig,
    preview_tx: mpsc::UnboundedSender<PreviewUpdate>,
    _observer: RunningStateObserver,
    started: bool,
}

impl<B: SessionBackend> SessionTask<B> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<CompletionEvent>,
    ) {
        let mut completions_closed = false;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = completions.recv(), if !completions_closed => match event {
                    Some(event) => self.handle_completion(event),
                    // Keep serving commands even if the completion source is
                    // gone; outstanding requests resolve at teardown.
                    None => completions_closed = true,
                },
            }
        }

        log::debug!("Session task shutting down");
        self.table.cancel_all();
        if self.started {
            if let Err(err) = self.backend.stop_running() {
                log::warn!("Failed to stop session during teardown: {}", err);
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Apply(configs, reply) => {
                let sinks = OutputSinks {
                    photo: self.outputs.photo_sink(),
                    motion: self.outputs.motion_sink(),
                };
                let result = self.graph.apply_configurations(
                    &mut self.backend,
                    &mut self.catalog,
                    sinks,
                    &configs,
                    &self.preview_tx,
                );
                let _ = reply.send(result);
            }
            Command::Start(reply) => {
                // Blocking, hardware-bound call; commands queue behind it.
                let result = self.backend.start_running();
                if result.is_ok() {
                    self.started = true;
                }
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let result = self.backend.stop_running();
                if result.is_ok() {
                    self.started = false;
                }
                let _ = reply.send(result);
            }
            Command::CapturePhoto(reply) => {
                let result = self.outputs.capture_photo(&mut self.backend, &mut self.table);
                let _ = reply.send(result);
            }
            Command::StartRecording(reply) => {
                let result = self.outputs.start_recording(
                    &mut self.backend,
                    &mut self.table,
                    &self.config,
                );
                let _ = reply.send(result);
            }
            Command::StopRecording(reply) => {
                self.outputs.stop_recording(&mut self.backend);
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn handle_completion(&mut self, event: CompletionEvent) {
        let outcome = match event {
            CompletionEvent::Photo {
                settings_id,
                result,
            } => {
                let key = CorrelationKey::PhotoSettings(settings_id);
                let mapped = match result {
                    Err(reason) => Err(SessionError::CaptureFailed(reason)),
                    Ok(None) => Err(SessionError::NoImageProduced),
                    Ok(Some(artifact)) => Ok(artifact),
                };
                self.table.resolve::<PhotoArtifact>(&key, mapped)
            }
            CompletionEvent::Recording { path, result } => {
                self.outputs.recording_finished(&path);
                let key = CorrelationKey::RecordingPath(path.clone());
                let mapped = match result {
                    Err(reason) => Err(SessionError::RecordingFailed(reason)),
                    Ok(()) => Ok(path),
                };
                self.table.resolve::<PathBuf>(&key, mapped)
            }
        };
        if let Err(err) = outcome {
            // A completion nobody asked for means the correlation invariant
            // was violated upstream. Report it loudly; swallowing it would
            // hide the defect.
            log::error!("{}", err);
        }
    }
}
