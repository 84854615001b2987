//! Multicam: declarative capture session management for multi-device media
//! pipelines.
//!
//! The crate reconciles an order-independent list of desired capture outputs
//! (previews, still photo, motion recording) against a stateful hardware
//! session graph, reusing wiring where nothing changed and pruning what is no
//! longer wanted, and correlates asynchronous hardware completions back to
//! the logical request that triggered them.
//!
//! # Features
//! - Minimal-churn graph reconciliation under a transactional boundary
//! - Heterogeneously keyed correlation of photo and recording completions
//! - One serialized session task; completions handed off from any context
//! - De-duplicated running-state notifications
//! - Backend-agnostic: the hardware surface is the [`SessionBackend`] trait
//!
//! # Usage
//! ```rust,no_run
//! use multicam::testing::SyntheticSession;
//! use multicam::{CaptureConfig, CaptureSession, Device, PreviewSlot, SinkConfig};
//!
//! # async fn example() -> Result<(), multicam::SessionError> {
//! let (backend, completions) = SyntheticSession::new();
//! let (session, _events) = CaptureSession::open(backend, completions, CaptureConfig::default());
//!
//! session.start().await?;
//! let slot = PreviewSlot::new();
//! session
//!     .apply(vec![
//!         SinkConfig::Preview { device: Device::Back, slot },
//!         SinkConfig::Photo { device: Device::Back },
//!     ])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod errors;
pub mod output;
pub mod session;
pub mod types;

// Testing utilities - deterministic backend for offline tests
pub mod testing;

// Re-exports for convenience
pub use backend::{CompletionEvent, ConnectionTarget, SessionBackend};
pub use config::CaptureConfig;
pub use errors::SessionError;
pub use session::{ActiveRecording, CaptureSession, SessionEvents, SessionHandle};
pub use types::{
    Device, PhotoArtifact, PreviewId, PreviewSlot, PreviewUpdate, SinkConfig,
};

/// Initialize logging for the capture engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "multicam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_metadata() {
        assert_eq!(NAME, "multicam");
        assert!(!VERSION.is_empty());
    }
}
