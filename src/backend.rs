//! The seam between the reconciliation engine and the underlying hardware
//! session.
//!
//! Everything the engine does to the live graph goes through [`SessionBackend`].
//! The crate ships no device backend of its own; an embedding supplies one for
//! its platform, and [`crate::testing::SyntheticSession`] provides a
//! deterministic in-memory one for tests.

use crate::errors::SessionError;
use crate::types::{
    ConnectionId, Device, InputId, InputPort, MediaKind, PhotoArtifact, PreviewId, SinkId,
};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// What a connection delivers frames into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTarget {
    Preview(PreviewId),
    Sink(SinkId),
}

/// An asynchronous hardware completion.
///
/// Backends deliver these from whatever context their callbacks fire on; the
/// session task is the only consumer and hands them to the correlation table
/// on its own serialized context. `result` carries the hardware's failure
/// reason as text; the engine maps it onto [`SessionError`].
#[derive(Debug)]
pub enum CompletionEvent {
    /// A photo capture finished. `Ok(None)` means the hardware reported
    /// success but produced no usable frame.
    Photo {
        settings_id: u64,
        result: Result<Option<PhotoArtifact>, String>,
    },
    /// A recording was finalized at `path`.
    Recording {
        path: PathBuf,
        result: Result<(), String>,
    },
}

/// Low-level capture session surface.
///
/// # Configuration transactions
///
/// All graph mutation happens between `begin_configuration` and
/// `commit_configuration`. Transactions nest: mutations stage until the
/// outermost commit publishes them atomically. `abort_configuration` at any
/// depth discards the entire staged set once the outermost bracket closes, so
/// a failed reconciliation pass leaves the published graph untouched.
///
/// # Threading
///
/// One owner drives all methods; the underlying hardware session forbids
/// concurrent configuration. `start_running` and `stop_running` are blocking
/// calls that can take tens of milliseconds.
pub trait SessionBackend: Send + 'static {
    fn begin_configuration(&mut self);
    fn commit_configuration(&mut self);
    fn abort_configuration(&mut self);

    /// Open the camera at `device` and attach it to the session without
    /// connections. Fails with `DeviceUnavailable` if no such camera exists,
    /// `GraphRejected` if the session refuses the input.
    fn add_camera_input(&mut self, device: Device) -> Result<InputId, SessionError>;

    /// Open the microphone and attach it without connections.
    fn add_microphone_input(&mut self) -> Result<InputId, SessionError>;

    /// Look up the port carrying `media` on `input`.
    fn port(&self, input: InputId, media: MediaKind) -> Result<InputPort, SessionError>;

    /// Create a low-level preview construct, not yet connected to anything.
    fn create_preview(&mut self) -> PreviewId;

    /// Release a preview construct whose connection was pruned.
    fn release_preview(&mut self, preview: PreviewId);

    /// Create the still-photo sink. Called once per session.
    fn create_photo_sink(&mut self) -> SinkId;

    /// Create the motion sink. Called once per session.
    fn create_motion_sink(&mut self) -> SinkId;

    /// Attach a sink to the session without connections. Fails with
    /// `GraphRejected` if the session refuses it.
    fn attach_sink(&mut self, sink: SinkId) -> Result<(), SessionError>;

    /// Detach a sink from the session, removing any connections it still has.
    fn detach_sink(&mut self, sink: SinkId);

    fn is_sink_attached(&self, sink: SinkId) -> bool;

    /// Wire `ports` into `target`. Fails with `GraphRejected` if the session
    /// refuses the connection (capacity, conflicting configuration).
    fn add_connection(
        &mut self,
        ports: &[InputPort],
        target: ConnectionTarget,
        mirrored: bool,
    ) -> Result<ConnectionId, SessionError>;

    fn remove_connection(&mut self, connection: ConnectionId);

    /// Every connection currently in the published graph (staged view inside
    /// a transaction), with what it targets.
    fn connections(&self) -> Vec<(ConnectionId, ConnectionTarget)>;

    /// Start the session running. Blocking.
    fn start_running(&mut self) -> Result<(), SessionError>;

    /// Stop the session. Blocking.
    fn stop_running(&mut self) -> Result<(), SessionError>;

    /// The session's running flag. Transitions are observed by
    /// [`crate::session::RunningStateObserver`], which de-duplicates them.
    fn running(&self) -> watch::Receiver<bool>;

    /// Trigger a still capture on `sink`. The completion arrives later as
    /// [`CompletionEvent::Photo`] carrying the same `settings_id`.
    fn capture_photo(&mut self, sink: SinkId, settings_id: u64) -> Result<(), SessionError>;

    /// Start recording on `sink` to `destination`. The completion arrives as
    /// [`CompletionEvent::Recording`] for the same path once finalized.
    fn start_recording(&mut self, sink: SinkId, destination: &Path) -> Result<(), SessionError>;

    /// Ask the hardware to finalize the active recording. No-op if nothing is
    /// being recorded.
    fn stop_recording(&mut self, sink: SinkId);
}
