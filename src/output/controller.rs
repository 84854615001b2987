//! The still-photo and motion sinks and the operations that drive them.

use crate::backend::SessionBackend;
use crate::config::CaptureConfig;
use crate::errors::SessionError;
use crate::output::correlation::{CorrelationKey, CorrelationTable, PendingRequest};
use crate::types::{Device, PhotoArtifact, SinkConfig, SinkId};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordingState {
    Idle,
    Recording { destination: PathBuf },
}

/// Owns the session's one photo sink and one motion sink.
///
/// Capture and recording operations register a pending request with the
/// correlation table, trigger the hardware, and hand back the receiver the
/// caller awaits; the session task resolves it when the matching completion
/// arrives.
pub struct OutputController {
    photo_sink: SinkId,
    motion_sink: SinkId,
    next_settings_id: u64,
    recording: RecordingState,
}

impl OutputController {
    /// Create both sinks. They are not attached to the session until a
    /// reconciliation pass wires them.
    pub fn new<B: SessionBackend>(backend: &mut B) -> Self {
        Self {
            photo_sink: backend.create_photo_sink(),
            motion_sink: backend.create_motion_sink(),
            next_settings_id: 0,
            recording: RecordingState::Idle,
        }
    }

    pub fn photo_sink(&self) -> SinkId {
        self.photo_sink
    }

    pub fn motion_sink(&self) -> SinkId {
        self.motion_sink
    }

    /// The desired-configuration entries that wire both sinks to `device`.
    pub fn sink_configs(&self, device: Device) -> Vec<SinkConfig> {
        vec![SinkConfig::Photo { device }, SinkConfig::Motion { device }]
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording, RecordingState::Recording { .. })
    }

    /// Trigger a still capture. The receiver resolves with the image, or with
    /// `CaptureFailed`/`NoImageProduced` once the hardware reports back.
    pub fn capture_photo<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        table: &mut CorrelationTable,
    ) -> Result<oneshot::Receiver<Result<PhotoArtifact, SessionError>>, SessionError> {
        self.next_settings_id += 1;
        let settings_id = self.next_settings_id;
        let key = CorrelationKey::PhotoSettings(settings_id);

        let (request, rx) = PendingRequest::new();
        table.register(key.clone(), request)?;

        log::debug!("Triggering photo capture with settings id {}", settings_id);
        if let Err(err) = backend.capture_photo(self.photo_sink, settings_id) {
            // Deliver the trigger failure through the pending request so the
            // caller observes exactly one outcome.
            table.resolve::<PhotoArtifact>(&key, Err(err))?;
        }
        Ok(rx)
    }

    /// Begin recording to a fresh destination under the configured output
    /// directory. Only valid while idle; a second start while recording is
    /// rejected with `AlreadyRecording` rather than restarting the clip.
    ///
    /// The receiver resolves with the finished file's location once the
    /// hardware finalizes it, or with `RecordingFailed`.
    pub fn start_recording<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        table: &mut CorrelationTable,
        config: &CaptureConfig,
    ) -> Result<oneshot::Receiver<Result<PathBuf, SessionError>>, SessionError> {
        if self.is_recording() {
            return Err(SessionError::AlreadyRecording);
        }

        let destination = config.recording_destination();
        let key = CorrelationKey::RecordingPath(destination.clone());

        let (request, rx) = PendingRequest::new();
        table.register(key.clone(), request)?;

        match backend.start_recording(self.motion_sink, &destination) {
            Ok(()) => {
                log::info!("Recording started: {}", destination.display());
                self.recording = RecordingState::Recording { destination };
            }
            Err(err) => {
                table.resolve::<PathBuf>(&key, Err(err))?;
            }
        }
        Ok(rx)
    }

    /// Ask the hardware to finalize the active recording and return to idle.
    /// No-op when nothing is recording.
    pub fn stop_recording<B: SessionBackend>(&mut self, backend: &mut B) {
        match std::mem::replace(&mut self.recording, RecordingState::Idle) {
            RecordingState::Idle => {
                log::debug!("Stop requested with no active recording");
            }
            RecordingState::Recording { destination } => {
                log::info!("Stopping recording: {}", destination.display());
                backend.stop_recording(self.motion_sink);
            }
        }
    }

    /// Completion-side reset: a recording that ended on the hardware side
    /// (including by failure) returns the controller to idle.
    pub fn recording_finished(&mut self, path: &Path) {
        if let RecordingState::Recording { destination } = &self.recording {
            if destination == path {
                self.recording = RecordingState::Idle;
            }
        }
    }
}
