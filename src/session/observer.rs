//! De-duplicated republication of the session's running flag.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Watches the backend's running flag and forwards only value changes to a
/// single downstream consumer.
///
/// The observer seeds its notion of "last seen" from the flag's current value
/// at spawn, so redundant writes of the same value (which the underlying
/// session produces freely) never reach the consumer. The forwarding task is
/// aborted when the observer is dropped.
pub struct RunningStateObserver {
    task: JoinHandle<()>,
}

impl RunningStateObserver {
    pub fn spawn(
        mut running: watch::Receiver<bool>,
        consumer: mpsc::UnboundedSender<bool>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut last = *running.borrow_and_update();
            while running.changed().await.is_ok() {
                let value = *running.borrow_and_update();
                if value == last {
                    continue;
                }
                last = value;
                log::debug!("Session running flag changed: {}", value);
                if consumer.send(value).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }
}

impl Drop for RunningStateObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
