use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// One progress report from a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl Progress {
    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Cancel, pause and resume handle for a running batch.
///
/// Clone it before starting the batch and keep the clone wherever the user's
/// intent comes from (a signal handler, a UI button). Pausing holds back work
/// that has not started yet; lookups already in flight run to completion.
/// Cancelling marks everything not yet started as cancelled, and the batch
/// still reports a final progress event for every item.
#[derive(Debug, Clone)]
pub struct BatchControl {
    inner: Arc<ControlState>,
}

#[derive(Debug)]
struct ControlState {
    cancelled: AtomicBool,
    paused: watch::Sender<bool>,
}

impl Default for BatchControl {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlState {
                cancelled: AtomicBool::new(false),
                paused,
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        // Release anything parked on a pause so it can observe the cancellation.
        self.inner.paused.send_replace(false);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        if !self.is_cancelled() {
            self.inner.paused.send_replace(true);
        }
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    /// Wait until the batch is not paused (or has been cancelled).
    pub async fn proceed(&self) {
        let mut rx = self.inner.paused.subscribe();
        // The sender lives in `inner`, which we hold, so the channel cannot close.
        let _ = rx
            .wait_for(|paused| !*paused || self.is_cancelled())
            .await;
    }
}
