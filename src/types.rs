//! Core data types shared across the capture session engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logical camera position. The session never deals in vendor device ids;
/// everything above the backend speaks in terms of these two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Front,
    Back,
}

impl Device {
    /// Flip between the front and back camera.
    pub fn toggle(&mut self) {
        *self = match self {
            Device::Front => Device::Back,
            Device::Back => Device::Front,
        };
    }

    /// Whether this is the front-facing camera. Output connections from the
    /// front camera are mirrored to match what the preview shows.
    pub fn is_front(&self) -> bool {
        matches!(self, Device::Front)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Front => write!(f, "front"),
            Device::Back => write!(f, "back"),
        }
    }
}

/// Media carried over a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Opaque handle to an opened input (camera or microphone) on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(pub u64);

/// Opaque handle to a photo or motion sink owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub u64);

/// Opaque handle to a connection wiring input ports to a sink or preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Opaque handle to a low-level preview construct created by the backend.
/// This is what gets handed to the presentation layer to attach to a display
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(pub u64);

/// A single media port on an input. A camera input exposes a video port; the
/// microphone input exposes an audio port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputPort {
    pub input: InputId,
    pub media: MediaKind,
}

/// Caller-minted identity for an externally-owned preview surface.
///
/// The engine never creates or destroys the surface behind a slot; it only
/// emits [`PreviewUpdate`] events telling the owner which low-level preview
/// handle (if any) is currently wired for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewSlot(Uuid);

impl PreviewSlot {
    /// Mint a fresh slot identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreviewSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification to the presentation layer that a preview slot gained or lost
/// its low-level handle. `handle` is `None` when the slot was unwired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewUpdate {
    pub slot: PreviewSlot,
    pub handle: Option<PreviewId>,
}

/// One desired capture output. The presentation layer recomputes a full list
/// of these whenever its needs change and pushes it to the session; list
/// order is insignificant except that the last entry wins when two entries
/// claim the same sink role for different devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkConfig {
    /// Live preview of `device` delivered to the surface identified by `slot`.
    Preview { device: Device, slot: PreviewSlot },
    /// Still-photo capture wired to `device`.
    Photo { device: Device },
    /// Motion recording wired to `device`, with audio from the microphone.
    Motion { device: Device },
}

/// A captured still image. The pixel payload is opaque to this crate; decoding
/// and display are the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoArtifact {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
