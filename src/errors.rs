use thiserror::Error;

/// Error type for all session, capture, and recording operations.
///
/// Recoverable errors propagate to the immediate caller of the failing
/// operation; nothing is retried inside this crate. `CorrelationViolation` is
/// a programming-contract failure, not a runtime condition callers are
/// expected to handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Session rejected graph change: {0}")]
    GraphRejected(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    #[error("Capture finished without producing an image")]
    NoImageProduced,

    #[error("Correlation violation: {0}")]
    CorrelationViolation(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Operation cancelled during teardown")]
    Cancelled,

    #[error("Session controller is no longer running")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),
}
