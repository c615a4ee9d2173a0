/// Pending-job queue and outstanding-job tracking for the worker pool.
///
/// The queue is an unbounded mpsc channel whose receiver is shared by every
/// worker behind a mutex; the tracker counts jobs that have been handed out
/// but not yet completed.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, warn};

use crate::models::Macro;

/// Unbounded handoff of pending macro-fetch jobs.
pub struct WorkQueue {
    sender: Option<mpsc::UnboundedSender<Macro>>,
    receiver: WorkReceiver,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: WorkReceiver {
                inner: Arc::new(Mutex::new(receiver)),
            },
        }
    }

    /// Enqueue one job. Returns false if the queue was already closed.
    pub fn push(&self, entry: Macro) -> bool {
        match &self.sender {
            Some(sender) => match sender.send(entry) {
                Ok(()) => true,
                Err(mpsc::error::SendError(entry)) => {
                    warn!("Work queue has no receivers, dropping {}", entry.name);
                    false
                }
            },
            None => {
                warn!("Work queue closed, dropping {}", entry.name);
                false
            }
        }
    }

    /// Close the queue. Workers finish whatever is still buffered, then stop.
    pub fn close(&mut self) {
        if self.sender.take().is_some() {
            debug!("Work queue closed");
        }
    }

    /// A handle workers use to pull jobs.
    pub fn receiver(&self) -> WorkReceiver {
        self.receiver.clone()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the [`WorkQueue`], cheap to clone.
#[derive(Clone)]
pub struct WorkReceiver {
    inner: Arc<Mutex<mpsc::UnboundedReceiver<Macro>>>,
}

impl WorkReceiver {
    /// Wait for the next job. `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Macro> {
        self.inner.lock().await.recv().await
    }
}

/// Counts jobs dispatched but not yet completed.
pub struct JobTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl JobTracker {
    pub fn new(total: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(total),
            idle: Notify::new(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Record one completion and return how many jobs remain.
    ///
    /// A completion on an idle tracker is ignored so the count never wraps.
    pub fn complete(&self) -> usize {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.idle.notify_waiters();
                0
            }
            Ok(n) => n - 1,
            Err(_) => {
                warn!("Completion recorded with no outstanding jobs");
                0
            }
        }
    }

    /// Wait until every job has completed.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a concurrent notify is not missed.
            let notified = self.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
