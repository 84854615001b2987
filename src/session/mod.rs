//! Session ownership: the reconciliation engine, device catalog, running
//! state observation, and the task that serializes all of it.

mod catalog;
mod controller;
mod graph;
mod observer;

pub use catalog::DeviceCatalog;
pub use controller::{ActiveRecording, CaptureSession, SessionEvents, SessionHandle};
pub use graph::{OutputSinks, SessionGraph};
pub use observer::RunningStateObserver;
