/// Fixed-size pool of fetch workers.
///
/// Each worker pulls macros off the [`WorkQueue`](crate::task_queue::WorkQueue),
/// fetches the image and forwards the outcome to the result channel. A failed
/// fetch is just another outcome; the worker keeps going.
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::FetchError;
use crate::models::MacroImage;
use crate::source::MacroSource;
use crate::task_queue::WorkReceiver;

/// What a worker hands to the collector for each job.
pub type FetchOutcome = Result<MacroImage, FetchError>;

/// Spawn `count` workers sharing one queue and one result channel.
///
/// Each handle resolves to the number of jobs that worker processed.
pub fn spawn_pool<S>(
    count: usize,
    source: Arc<S>,
    queue: WorkReceiver,
    results: mpsc::Sender<FetchOutcome>,
) -> Vec<JoinHandle<usize>>
where
    S: MacroSource + ?Sized + 'static,
{
    (0..count)
        .map(|id| {
            let source = source.clone();
            let queue = queue.clone();
            let results = results.clone();
            tokio::spawn(run_worker(id, source, queue, results))
        })
        .collect()
}

async fn run_worker<S>(
    id: usize,
    source: Arc<S>,
    queue: WorkReceiver,
    results: mpsc::Sender<FetchOutcome>,
) -> usize
where
    S: MacroSource + ?Sized,
{
    let mut processed = 0;

    while let Some(entry) = queue.next().await {
        debug!(worker = id, name = %entry.name, "Fetching macro");

        let fetched = source.fetch_image(&entry).await;
        let outcome = fetched.map_err(|e| FetchError::new(Some(entry), e));

        if results.send(outcome).await.is_err() {
            warn!(worker = id, "Result channel closed, worker stopping");
            break;
        }
        processed += 1;
    }

    debug!(worker = id, processed, "Worker finished");
    processed
}
