/// Single consumer of worker results.
///
/// The collector owns the [`Sink`] and is the only writer to the
/// [`ErrorSet`], so persistence never runs concurrently.
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::errors::FetchError;
use crate::sink::Sink;
use crate::task_queue::JobTracker;
use crate::workers::FetchOutcome;

/// Append-only list of per-job failures, in the order they were recorded.
#[derive(Clone, Default)]
pub struct ErrorSet {
    errors: Arc<Mutex<Vec<FetchError>>>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, error: FetchError) {
        self.errors.lock().await.push(error);
    }

    /// Take every recorded error, leaving the set empty.
    pub async fn take(&self) -> Vec<FetchError> {
        std::mem::take(&mut *self.errors.lock().await)
    }
}

pub struct ResultCollector<K> {
    sink: K,
    errors: ErrorSet,
    tracker: Arc<JobTracker>,
    progress: ProgressBar,
}

impl<K: Sink> ResultCollector<K> {
    pub fn new(sink: K, errors: ErrorSet, tracker: Arc<JobTracker>, progress: ProgressBar) -> Self {
        Self {
            sink,
            errors,
            tracker,
            progress,
        }
    }

    /// Drain the result channel until every sender is gone.
    ///
    /// Returns the number of images persisted.
    pub async fn run(mut self, mut results: mpsc::Receiver<FetchOutcome>) -> usize {
        let mut persisted = 0;

        while let Some(outcome) = results.recv().await {
            match outcome {
                Ok(image) => match self.sink.persist(&image).await {
                    Ok(()) => {
                        debug!(name = %image.name(), bytes = image.body.len(), "Persisted macro");
                        persisted += 1;
                    }
                    Err(e) => {
                        warn!(name = %image.name(), error = %e, "Failed to persist macro");
                        self.errors.push(FetchError::new(Some(image.entry), e)).await;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Failed to fetch macro");
                    self.errors.push(e).await;
                }
            }

            self.progress.inc(1);
            self.tracker.complete();
        }

        persisted
    }
}
