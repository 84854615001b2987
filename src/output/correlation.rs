//! Correlation of asynchronous hardware completions with pending requests.
//!
//! Photo captures are keyed by the settings id minted when the capture was
//! triggered; recordings are keyed by their destination path. Both kinds of
//! request live in one table, so the key is a closed sum over the payload
//! kinds in use: two keys are equal only when both the variant and the value
//! match.

use crate::errors::SessionError;
use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Key matching a hardware completion to the logical request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Photo capture, keyed by the settings id issued at trigger time.
    PhotoSettings(u64),
    /// Recording, keyed by its destination path.
    RecordingPath(PathBuf),
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationKey::PhotoSettings(id) => write!(f, "photo settings {}", id),
            CorrelationKey::RecordingPath(path) => write!(f, "recording {}", path.display()),
        }
    }
}

/// One pending logical request awaiting a result of type `T`.
///
/// Owned by the [`CorrelationTable`] from registration until it is resolved
/// exactly once, or cancelled at teardown.
pub struct PendingRequest<T> {
    tx: oneshot::Sender<Result<T, SessionError>>,
}

impl<T> PendingRequest<T> {
    /// Create a request plus the receiver the caller awaits.
    pub fn new() -> (Self, oneshot::Receiver<Result<T, SessionError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    fn fulfill(self, result: Result<T, SessionError>) {
        // The awaiting side may have been dropped; that is its choice, not a
        // correlation failure.
        let _ = self.tx.send(result);
    }
}

/// Object-safe face of a pending request so requests with different result
/// types share one table.
trait AnyPending: Send {
    fn as_any(&self) -> &dyn Any;
    fn cancel(self: Box<Self>);
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Send + 'static> AnyPending for PendingRequest<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn cancel(self: Box<Self>) {
        self.fulfill(Err(SessionError::Cancelled));
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Registry of pending requests keyed by [`CorrelationKey`].
///
/// Single-writer: the session task owns the table, and completions reach it
/// only through the session's inbound event channel. Duplicate registration
/// and completions with no matching entry are contract violations: they are
/// surfaced as [`SessionError::CorrelationViolation`] and must be reported
/// loudly by the caller, never swallowed.
#[derive(Default)]
pub struct CorrelationTable {
    pending: HashMap<CorrelationKey, Box<dyn AnyPending>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request under `key`.
    pub fn register<T: Send + 'static>(
        &mut self,
        key: CorrelationKey,
        request: PendingRequest<T>,
    ) -> Result<(), SessionError> {
        if self.pending.contains_key(&key) {
            return Err(SessionError::CorrelationViolation(format!(
                "duplicate registration for {}",
                key
            )));
        }
        self.pending.insert(key, Box::new(request));
        Ok(())
    }

    /// Remove the entry for `key` and fulfill it with `result`.
    ///
    /// Fails if no entry exists for `key`, or if the entry does not await a
    /// result of type `T`. Both mean the correlation invariant was violated
    /// upstream.
    pub fn resolve<T: Send + 'static>(
        &mut self,
        key: &CorrelationKey,
        result: Result<T, SessionError>,
    ) -> Result<(), SessionError> {
        let entry = self.pending.get(key).ok_or_else(|| {
            SessionError::CorrelationViolation(format!("no pending request for {}", key))
        })?;
        if !entry.as_any().is::<PendingRequest<T>>() {
            // Leave the entry pending so teardown still delivers a
            // cancellation outcome to whoever is awaiting it.
            return Err(SessionError::CorrelationViolation(format!(
                "pending request for {} has a different result type",
                key
            )));
        }
        let request = self
            .pending
            .remove(key)
            .expect("entry checked above")
            .into_any()
            .downcast::<PendingRequest<T>>()
            .expect("type checked above");
        request.fulfill(result);
        Ok(())
    }

    /// Cancel every pending request, delivering `SessionError::Cancelled`.
    pub fn cancel_all(&mut self) {
        for (key, entry) in self.pending.drain() {
            log::debug!("Cancelling pending request for {}", key);
            entry.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for CorrelationTable {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            // Requests should have been resolved or cancelled before the
            // table goes away; deliver the cancellation outcome anyway.
            log::error!(
                "Correlation table dropped with {} unresolved request(s)",
                self.pending.len()
            );
            self.cancel_all();
        }
    }
}
