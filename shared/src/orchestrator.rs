/// Run lifecycle: probe, list, dispatch, drain, report.
///
/// Only the probe and the listing can abort a run. Once jobs are
/// dispatched every failure is recorded per job and the run drains to
/// completion, unless the result collector itself dies.
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::collector::{ErrorSet, ResultCollector};
use crate::errors::{FetchError, RunError};
use crate::progress::job_progress;
use crate::sink::Sink;
use crate::source::MacroSource;
use crate::task_queue::{JobTracker, WorkQueue};
use crate::workers::spawn_pool;

/// Number of concurrent fetches when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Lifecycle phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Probing,
    Listing,
    Dispatching,
    Draining,
    Reporting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Probing => write!(f, "probing"),
            Phase::Listing => write!(f, "listing"),
            Phase::Dispatching => write!(f, "dispatching"),
            Phase::Draining => write!(f, "draining"),
            Phase::Reporting => write!(f, "reporting"),
            Phase::Done => write!(f, "done"),
        }
    }
}

fn enter(phase: Phase) {
    debug!(%phase, "Entering phase");
}

pub struct Orchestrator<S: ?Sized, K> {
    source: Arc<S>,
    sink: K,
    workers: usize,
    show_progress: bool,
}

impl<S, K> Orchestrator<S, K>
where
    S: MacroSource + ?Sized + 'static,
    K: Sink + 'static,
{
    /// `workers` is validated upstream; zero is bumped to one so the pool
    /// can always make progress.
    pub fn new(source: Arc<S>, sink: K, workers: usize) -> Self {
        enter(Phase::Init);
        Self {
            source,
            sink,
            workers: workers.max(1),
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while draining.
    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub async fn run(self) -> Result<Report, RunError> {
        enter(Phase::Probing);
        self.sink.probe_writable().await.map_err(RunError::Probe)?;

        enter(Phase::Listing);
        let macros = self.source.list_macros().await.map_err(RunError::Listing)?;
        let total = macros.len();
        info!("Found {} macros", total);

        if total == 0 {
            enter(Phase::Reporting);
            return Ok(Report::new(0, 0, Vec::new()));
        }

        enter(Phase::Dispatching);
        let tracker = Arc::new(JobTracker::new(total));
        let errors = ErrorSet::new();
        let progress = job_progress(total as u64, self.show_progress);
        let mut queue = WorkQueue::new();
        let (results_tx, results_rx) = mpsc::channel(self.workers);

        let workers = spawn_pool(self.workers, self.source.clone(), queue.receiver(), results_tx);
        let mut collector = tokio::spawn(
            ResultCollector::new(self.sink, errors.clone(), tracker.clone(), progress.clone())
                .run(results_rx),
        );
        info!("Started {} fetch workers", self.workers);

        for entry in macros {
            let queued = queue.push(entry);
            debug_assert!(queued, "work queue closed while dispatching");
        }

        enter(Phase::Draining);
        // The collector is the only thing that completes jobs; if it ends
        // first the tracker can never reach zero.
        let early_exit = tokio::select! {
            _ = tracker.wait_idle() => None,
            joined = &mut collector => Some(joined),
        };
        queue.close();

        if let Some(joined) = early_exit {
            for handle in &workers {
                handle.abort();
            }
            progress.abandon();
            let reason = match joined {
                Ok(_) => "result channel closed early".to_string(),
                Err(e) => e.to_string(),
            };
            error!(outstanding = tracker.outstanding(), %reason, "Result collector stopped early");
            return Err(RunError::CollectorStopped {
                outstanding: tracker.outstanding(),
                reason,
            });
        }

        for handle in workers {
            if let Err(e) = handle.await {
                warn!("Fetch worker did not shut down cleanly: {}", e);
            }
        }
        let persisted = match collector.await {
            Ok(n) => n,
            Err(e) => {
                error!("Result collector did not shut down cleanly: {}", e);
                return Err(RunError::CollectorStopped {
                    outstanding: 0,
                    reason: e.to_string(),
                });
            }
        };
        progress.finish();

        enter(Phase::Reporting);
        let report = Report::new(total, persisted, errors.take().await);
        info!(
            total = report.total,
            persisted = report.persisted,
            failed = report.errors.len(),
            "Run complete"
        );

        enter(Phase::Done);
        Ok(report)
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct Report {
    pub total: usize,
    pub persisted: usize,
    pub errors: Vec<FetchError>,
}

impl Report {
    pub fn new(total: usize, persisted: usize, errors: Vec<FetchError>) -> Self {
        Self {
            total,
            persisted,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Renders the error listing; a successful run renders nothing.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }
        writeln!(f, "{} errors:", self.errors.len())?;
        for error in &self.errors {
            writeln!(f, "- {}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, MemorySink, PanickingSink};
    use std::time::Duration;

    #[tokio::test]
    async fn test_one_failed_fetch_among_three() {
        let source = Arc::new(
            FakeSource::new(&[("A", "b1"), ("B", "b2"), ("C", "b3")]).failing("B"),
        );
        let sink = MemorySink::new();

        let report = Orchestrator::new(source.clone(), sink.clone(), 2)
            .run()
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(sink.file("A"), Some(b"b1".to_vec()));
        assert_eq!(sink.file("C"), Some(b"b3".to_vec()));
        assert!(sink.file("B").is_none());

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_transport());
        assert_eq!(report.errors[0].macro_name(), Some("B"));
        assert_eq!(
            report.to_string(),
            "1 errors:\n- B: transport error: Conduit error [ERR-CONDUIT-CORE]: cannot load id2\n"
        );
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let source = Arc::new(FakeSource::new(&[]));
        let report = Orchestrator::new(source.clone(), MemorySink::new(), 4)
            .run()
            .await
            .unwrap();

        assert_eq!(source.fetches(), 0);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.to_string(), "");
    }

    #[tokio::test]
    async fn test_probe_failure_skips_network() {
        let source = Arc::new(FakeSource::new(&[("A", "b1")]));
        let result = Orchestrator::new(source.clone(), MemorySink::unwritable(), 2)
            .run()
            .await;

        assert!(matches!(result, Err(RunError::Probe(_))));
        assert_eq!(source.list_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let source = Arc::new(FakeSource::new(&[("A", "b1")]).failing_listing());
        let result = Orchestrator::new(source.clone(), MemorySink::new(), 2)
            .run()
            .await;

        assert!(matches!(result, Err(RunError::Listing(_))));
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated() {
        let names: Vec<String> = (0..50).map(|i| format!("m{:02}", i)).collect();
        let entries: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "gif")).collect();
        let source = Arc::new(FakeSource::new(&entries).failing("m17"));
        let sink = MemorySink::new();

        let report = Orchestrator::new(source.clone(), sink.clone(), 5)
            .run()
            .await
            .unwrap();

        assert_eq!(source.fetches(), 50);
        assert_eq!(report.persisted, 49);
        assert_eq!(report.persisted + report.errors.len(), 50);
        assert_eq!(sink.file_count(), 49);
        assert_eq!(report.errors[0].macro_name(), Some("m17"));
    }

    #[tokio::test]
    async fn test_persist_failure_reported_as_storage() {
        let source = Arc::new(FakeSource::new(&[("A", "b1"), ("B", "b2")]));
        let sink = MemorySink::rejecting(&["A"]);

        let report = Orchestrator::new(source, sink.clone(), 2).run().await.unwrap();

        assert_eq!(report.persisted, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_storage());
        assert_eq!(report.errors[0].macro_name(), Some("A"));
        assert!(report.to_string().contains("- A: storage error:"));
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_worker_count() {
        let names: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
        let entries: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "gif")).collect();
        let source = Arc::new(FakeSource::new(&entries).with_delay(Duration::from_millis(10)));

        let report = Orchestrator::new(source.clone(), MemorySink::new(), 3)
            .run()
            .await
            .unwrap();

        assert!(report.is_success());
        let peak = source.max_in_flight.load(std::sync::atomic::Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak in-flight fetches was {}", peak);
    }

    #[tokio::test]
    async fn test_duplicate_names_overwrite() {
        let source = Arc::new(FakeSource::new(&[("A", "new"), ("A", "new")]));
        let sink = MemorySink::new();

        let report = Orchestrator::new(source, sink.clone(), 2).run().await.unwrap();

        assert_eq!(report.persisted, 2);
        assert_eq!(sink.writes.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(sink.file_count(), 1);
    }

    #[tokio::test]
    async fn test_collector_panic_is_fatal_not_a_hang() {
        let source = Arc::new(FakeSource::new(&[("A", "b1"), ("B", "b2")]));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Orchestrator::new(source, PanickingSink, 2).run(),
        )
        .await
        .expect("run should not hang when the collector dies");

        match result {
            Err(RunError::CollectorStopped { outstanding, .. }) => assert!(outstanding > 0),
            other => panic!("expected CollectorStopped, got {:?}", other),
        }
    }

    #[test]
    fn test_report_lists_each_error() {
        use crate::errors::{StorageError, TransportError};
        use crate::models::Macro;

        let report = Report::new(
            3,
            1,
            vec![
                FetchError::new(Some(Macro::new("a", "1")), TransportError::InvalidResponse("missing result".into())),
                FetchError::new(Some(Macro::new("b", "2")), StorageError::InvalidName("b/c".into())),
            ],
        );
        assert_eq!(
            report.to_string(),
            "2 errors:\n- a: transport error: Invalid response: missing result\n- b: storage error: invalid macro name \"b/c\"\n"
        );
        assert_eq!(report.exit_code(), 1);
    }
}
