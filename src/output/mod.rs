//! Still-photo and motion output handling, and the correlation of their
//! asynchronous completions.

mod controller;
mod correlation;

pub use controller::OutputController;
pub use correlation::{CorrelationKey, CorrelationTable, PendingRequest};
