//! Batch processor: submission API, work queue, and lifecycle control

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{ProcessingConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::providers::{DocumentExtractor, ReportExporter};
use crate::types::{Batch, BatchSummary, DocumentTask, Job};

use super::store::JobStore;
use super::worker::ExtractionWorker;

/// Reference to queued work; the store holds the actual records
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkItem {
    pub(crate) batch_id: Option<Uuid>,
    pub(crate) job_id: Uuid,
}

pub(crate) type JobCallback = Box<dyn Fn(&Job) + Send + Sync>;
pub(crate) type BatchCallback = Box<dyn Fn(&Batch) + Send + Sync>;

/// Completion subscribers, shared with the worker
#[derive(Default)]
pub(crate) struct Subscribers {
    pub(crate) on_job_complete: Mutex<Vec<JobCallback>>,
    pub(crate) on_batch_complete: Mutex<Vec<BatchCallback>>,
}

/// State shared between the processor handle and its worker
pub(crate) struct Shared {
    pub(crate) store: JobStore,
    pub(crate) queue_depth: AtomicUsize,
    pub(crate) subscribers: Subscribers,
}

/// Snapshot of queue health
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    /// False once shutdown has been requested
    pub running: bool,

    /// Work items waiting in the queue
    pub queue_depth: usize,

    pub batch_count: usize,

    pub job_count: usize,
}

/// Coordinates the job store, the work queue, and the single worker that
/// drains it.
///
/// Cloning is cheap and every clone drives the same queue. The worker task
/// is spawned on construction, so a processor must be created inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct BatchProcessor {
    inner: Arc<ProcessorInner>,
}

struct ProcessorInner {
    shared: Arc<Shared>,
    sender: mpsc::Sender<WorkItem>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchProcessor {
    /// Spawn the worker and return a handle for submissions and queries
    pub fn new(
        processing: &ProcessingConfig,
        storage: &StorageConfig,
        extractor: Arc<dyn DocumentExtractor>,
        exporter: Arc<dyn ReportExporter>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(processing.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            store: JobStore::new(),
            queue_depth: AtomicUsize::new(0),
            subscribers: Subscribers::default(),
        });

        let worker = ExtractionWorker::new(
            shared.clone(),
            extractor,
            exporter,
            processing.delay(),
            storage.reports_dir.clone(),
            storage.processed_dir.clone(),
        );
        let handle = tokio::spawn(worker.run(receiver, shutdown_rx));

        tracing::info!(
            "Batch processor started (inter-job delay: {:.1}s)",
            processing.delay_between_jobs_secs
        );

        Self {
            inner: Arc::new(ProcessorInner {
                shared,
                sender,
                shutdown: shutdown_tx,
                worker: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Create a batch of jobs from task descriptors, preserving input order
    pub async fn create_batch(&self, tasks: Vec<DocumentTask>) -> Result<Batch> {
        if tasks.is_empty() {
            return Err(Error::invalid_request("Batch contains no tasks"));
        }

        let batch_id = Uuid::new_v4();
        let jobs: Vec<Job> = tasks
            .into_iter()
            .map(|task| Job::new(task, Some(batch_id)))
            .collect();
        let batch = Batch::new(batch_id, jobs.iter().map(|j| j.id).collect());

        for job in &jobs {
            self.inner.shared.store.insert_job(job.clone());
        }
        self.inner.shared.store.insert_batch(batch.clone());

        for job in &jobs {
            self.enqueue(WorkItem {
                batch_id: Some(batch_id),
                job_id: job.id,
            })
            .await?;
        }

        tracing::info!("Created batch {} with {} jobs", batch_id, jobs.len());
        Ok(batch)
    }

    /// Submit one standalone task with no batch association
    pub async fn add_single_job(&self, task: DocumentTask) -> Result<Job> {
        let job = Job::new(task, None);
        let job_id = job.id;
        self.inner.shared.store.insert_job(job.clone());
        self.enqueue(WorkItem {
            batch_id: None,
            job_id,
        })
        .await?;

        tracing::info!("Queued job {} ({})", job_id, job.task.filename);
        Ok(job)
    }

    async fn enqueue(&self, item: WorkItem) -> Result<()> {
        self.inner.shared.queue_depth.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.inner.sender.send(item).await {
            self.inner.shared.queue_depth.fetch_sub(1, Ordering::SeqCst);
            self.inner
                .shared
                .store
                .fail_job(item.job_id, "Queue closed before submission");
            return Err(Error::Queue(format!("Failed to queue job: {}", e)));
        }
        Ok(())
    }

    /// Snapshot of a single job
    pub fn job(&self, id: Uuid) -> Option<Job> {
        self.inner.shared.store.job(id)
    }

    /// Snapshot of a single batch record
    pub fn batch(&self, id: Uuid) -> Option<Batch> {
        self.inner.shared.store.batch(id)
    }

    /// Member job snapshots in submission order
    pub fn batch_jobs(&self, id: Uuid) -> Option<Vec<Job>> {
        self.inner.shared.store.batch_jobs(id)
    }

    /// Batch view with metrics derived at read time
    pub fn batch_summary(&self, id: Uuid) -> Option<BatchSummary> {
        self.inner.shared.store.batch_summary(id)
    }

    /// All batches in creation order
    pub fn batches(&self) -> Vec<BatchSummary> {
        self.inner.shared.store.batch_summaries()
    }

    /// Cancel a batch's pending jobs; running jobs finish on their own.
    /// Returns false for an unknown batch id.
    pub fn cancel_batch(&self, id: Uuid) -> bool {
        let cancelled = self.inner.shared.store.cancel_batch(id);
        if cancelled {
            tracing::info!("Cancelled batch {}", id);
        }
        cancelled
    }

    /// Register a callback fired after every job the worker finishes,
    /// successfully or not.
    ///
    /// Callbacks run on the worker task between jobs; keep them fast.
    pub fn on_job_complete(&self, callback: impl Fn(&Job) + Send + Sync + 'static) {
        self.inner
            .shared
            .subscribers
            .on_job_complete
            .lock()
            .push(Box::new(callback));
    }

    /// Register a callback fired when a batch's last member finishes
    pub fn on_batch_complete(&self, callback: impl Fn(&Batch) + Send + Sync + 'static) {
        self.inner
            .shared
            .subscribers
            .on_batch_complete
            .lock()
            .push(Box::new(callback));
    }

    pub fn queue_status(&self) -> QueueStatus {
        let (batch_count, job_count) = self.inner.shared.store.counts();
        QueueStatus {
            running: !*self.inner.shutdown.borrow(),
            queue_depth: self.inner.shared.queue_depth.load(Ordering::SeqCst),
            batch_count,
            job_count,
        }
    }

    /// Signal the worker to stop and wait for it to finish its current job
    pub async fn shutdown(&self, timeout: Duration) {
        let _ = self.inner.shutdown.send(true);
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(timeout, handle).await {
                Ok(_) => tracing::info!("Batch processor stopped"),
                Err(_) => tracing::warn!("Worker did not stop within {:?}", timeout),
            }
        }
    }

    /// Shutdown signal for auxiliary tasks tied to the processor lifetime
    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchStatus, ExtractionReport, InvoiceRecord, JobStatus};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    struct StubExtractor {
        delay: Duration,
        fail_substring: Option<&'static str>,
        invoices: usize,
        executions: Arc<Mutex<Vec<(String, Instant)>>>,
    }

    impl StubExtractor {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                fail_substring: None,
                invoices: 0,
                executions: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl DocumentExtractor for StubExtractor {
        async fn execute(&self, task: &DocumentTask) -> Result<ExtractionReport> {
            self.executions
                .lock()
                .push((task.filename.clone(), Instant::now()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(marker) = self.fail_substring {
                if task.filename.contains(marker) {
                    return Err(Error::extraction("simulated failure"));
                }
            }
            let invoices = (0..self.invoices)
                .map(|i| InvoiceRecord {
                    invoice_number: Some(format!("INV-{}", i)),
                    ..Default::default()
                })
                .collect();
            Ok(ExtractionReport::from_invoices(
                task.filename.clone(),
                "acme".to_string(),
                false,
                1,
                invoices,
            ))
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct RecordingExporter {
        exports: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingExporter {
        fn new() -> Self {
            Self {
                exports: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ReportExporter for RecordingExporter {
        async fn export(&self, report: &ExtractionReport, dest_dir: &Path) -> Result<PathBuf> {
            if self.fail {
                return Err(Error::export("simulated export failure"));
            }
            self.exports.lock().push(report.filename.clone());
            Ok(dest_dir.join(format!("{}.csv", report.filename)))
        }
    }

    fn processor_with(
        extractor: StubExtractor,
        exporter: RecordingExporter,
        delay_ms: u64,
    ) -> BatchProcessor {
        let processing = ProcessingConfig {
            delay_between_jobs_secs: delay_ms as f64 / 1000.0,
            ..Default::default()
        };
        BatchProcessor::new(
            &processing,
            &StorageConfig::default(),
            Arc::new(extractor),
            Arc::new(exporter),
        )
    }

    fn tasks(names: &[&str]) -> Vec<DocumentTask> {
        names
            .iter()
            .map(|n| DocumentTask::new(format!("/nonexistent/{}", n)))
            .collect()
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5s");
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);
        let result = processor.create_batch(vec![]).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_single_job_runs_to_completion() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);
        let job = processor
            .add_single_job(DocumentTask::new("/nonexistent/a.pdf"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.batch_id.is_none());

        wait_until(|| processor.job(job.id).unwrap().status.is_terminal()).await;

        let done = processor.job(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());
        assert!(done.result.is_some());
    }

    #[tokio::test]
    async fn test_batch_drains_to_completed() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);
        let batch = processor
            .create_batch(tasks(&["a.pdf", "b.pdf", "c.pdf"]))
            .await
            .unwrap();
        assert_eq!(batch.job_ids.len(), 3);

        wait_until(|| processor.batch(batch.id).unwrap().status == BatchStatus::Completed).await;

        let summary = processor.batch_summary(batch.id).unwrap();
        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.completed_jobs, 3);
        assert_eq!(summary.successful_jobs, 3);
        assert_eq!(summary.failed_jobs, 0);
        assert_eq!(summary.progress, 100);
        for job in &summary.jobs {
            assert_eq!(job.progress, 100);
        }
    }

    #[tokio::test]
    async fn test_batch_with_failure_still_completes() {
        let extractor = StubExtractor {
            fail_substring: Some("bad"),
            ..StubExtractor::new(0)
        };
        let processor = processor_with(extractor, RecordingExporter::new(), 0);
        let batch = processor
            .create_batch(tasks(&["good.pdf", "bad.pdf"]))
            .await
            .unwrap();

        wait_until(|| processor.batch(batch.id).unwrap().status == BatchStatus::Completed).await;

        let summary = processor.batch_summary(batch.id).unwrap();
        assert_eq!(summary.successful_jobs, 1);
        assert_eq!(summary.failed_jobs, 1);
        assert_eq!(summary.progress, 100); // failures count as completed work

        let failed = summary
            .jobs
            .iter()
            .find(|j| j.status == JobStatus::Failed)
            .unwrap();
        assert!(failed.error.as_deref().unwrap().contains("simulated failure"));
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let extractor = StubExtractor::new(0);
        let executions = extractor.executions.clone();
        let processor = processor_with(extractor, RecordingExporter::new(), 0);

        let batch = processor
            .create_batch(tasks(&["1.pdf", "2.pdf", "3.pdf", "4.pdf"]))
            .await
            .unwrap();
        wait_until(|| processor.batch(batch.id).unwrap().status == BatchStatus::Completed).await;

        let order: Vec<String> = executions.lock().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(order, vec!["1.pdf", "2.pdf", "3.pdf", "4.pdf"]);
    }

    #[tokio::test]
    async fn test_delay_between_jobs() {
        let extractor = StubExtractor::new(0);
        let executions = extractor.executions.clone();
        let processor = processor_with(extractor, RecordingExporter::new(), 200);

        let batch = processor
            .create_batch(tasks(&["a.pdf", "b.pdf", "c.pdf"]))
            .await
            .unwrap();
        wait_until(|| processor.batch(batch.id).unwrap().status == BatchStatus::Completed).await;

        let starts: Vec<Instant> = executions.lock().iter().map(|(_, t)| *t).collect();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(200),
                "jobs started {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test]
    async fn test_cancel_skips_pending_jobs() {
        // First job holds the worker long enough for the cancel to land
        let extractor = StubExtractor::new(300);
        let executions = extractor.executions.clone();
        let processor = processor_with(extractor, RecordingExporter::new(), 0);

        let batch = processor
            .create_batch(tasks(&["first.pdf", "second.pdf", "third.pdf"]))
            .await
            .unwrap();
        wait_until(|| {
            processor.job(batch.job_ids[0]).unwrap().status == JobStatus::Processing
        })
        .await;

        assert!(processor.cancel_batch(batch.id));
        assert!(!processor.cancel_batch(Uuid::new_v4()));

        // The in-flight job finishes; the rest never run
        wait_until(|| processor.job(batch.job_ids[0]).unwrap().status.is_terminal()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let summary = processor.batch_summary(batch.id).unwrap();
        assert_eq!(summary.status, BatchStatus::Cancelled);
        assert_eq!(summary.successful_jobs, 1);
        assert_eq!(summary.jobs[1].status, JobStatus::Cancelled);
        assert_eq!(summary.jobs[2].status, JobStatus::Cancelled);
        assert!(summary.jobs[2].started_at.is_none());

        let executed: Vec<String> = executions.lock().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(executed, vec!["first.pdf"]);
    }

    #[tokio::test]
    async fn test_skipped_entries_charge_no_delay() {
        let extractor = StubExtractor::new(300);
        let executions = extractor.executions.clone();
        let processor = processor_with(extractor, RecordingExporter::new(), 250);

        let first = processor
            .add_single_job(DocumentTask::new("/nonexistent/first.pdf"))
            .await
            .unwrap();
        let batch = processor
            .create_batch(tasks(&["skip1.pdf", "skip2.pdf"]))
            .await
            .unwrap();
        let last = processor
            .add_single_job(DocumentTask::new("/nonexistent/last.pdf"))
            .await
            .unwrap();

        // Cancel while the first job still occupies the worker
        processor.cancel_batch(batch.id);

        wait_until(|| processor.job(last.id).unwrap().status.is_terminal()).await;

        let starts = executions.lock();
        assert_eq!(starts.len(), 2); // cancelled members never executed
        let gap = starts[1].1 - starts[0].1;
        // One execution (300ms) plus one delay (250ms); skipped entries
        // would have added 500ms more.
        assert!(gap >= Duration::from_millis(540), "gap was {:?}", gap);
        assert!(gap < Duration::from_millis(1000), "gap was {:?}", gap);
        drop(starts);

        assert_eq!(processor.job(first.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_completion_callbacks() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);

        let (job_tx, mut job_rx) = mpsc::unbounded_channel();
        let tx1 = job_tx.clone();
        processor.on_job_complete(move |job| {
            let _ = tx1.send(("one", job.id));
        });
        processor.on_job_complete(move |job| {
            let _ = job_tx.send(("two", job.id));
        });

        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
        processor.on_batch_complete(move |batch| {
            let _ = batch_tx.send(batch.id);
        });

        let batch = processor.create_batch(tasks(&["a.pdf"])).await.unwrap();

        // Both job subscribers fire for the same job
        let first = job_rx.recv().await.unwrap();
        let second = job_rx.recv().await.unwrap();
        assert_eq!(first.1, batch.job_ids[0]);
        assert_eq!(second.1, batch.job_ids[0]);
        assert_ne!(first.0, second.0);

        assert_eq!(batch_rx.recv().await.unwrap(), batch.id);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_kill_worker() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);
        processor.on_job_complete(|_| panic!("subscriber bug"));

        let first = processor
            .add_single_job(DocumentTask::new("/nonexistent/a.pdf"))
            .await
            .unwrap();
        wait_until(|| processor.job(first.id).unwrap().status.is_terminal()).await;

        // The worker survives and keeps processing
        let second = processor
            .add_single_job(DocumentTask::new("/nonexistent/b.pdf"))
            .await
            .unwrap();
        wait_until(|| processor.job(second.id).unwrap().status.is_terminal()).await;
        assert_eq!(processor.job(second.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_queue_status_lifecycle() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);

        let status = processor.queue_status();
        assert!(status.running);
        assert_eq!(status.queue_depth, 0);
        assert_eq!(status.batch_count, 0);
        assert_eq!(status.job_count, 0);

        let batch = processor.create_batch(tasks(&["a.pdf", "b.pdf"])).await.unwrap();
        wait_until(|| processor.batch(batch.id).unwrap().status == BatchStatus::Completed).await;

        let status = processor.queue_status();
        assert_eq!(status.batch_count, 1);
        assert_eq!(status.job_count, 2);
        assert_eq!(status.queue_depth, 0); // drained

        processor.shutdown(Duration::from_secs(1)).await;
        assert!(!processor.queue_status().running);
    }

    #[tokio::test]
    async fn test_submissions_fail_after_shutdown() {
        let processor = processor_with(StubExtractor::new(0), RecordingExporter::new(), 0);
        processor.shutdown(Duration::from_secs(1)).await;

        let result = processor
            .add_single_job(DocumentTask::new("/nonexistent/late.pdf"))
            .await;
        assert!(matches!(result, Err(Error::Queue(_))));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_current_job() {
        let extractor = StubExtractor::new(200);
        let processor = processor_with(extractor, RecordingExporter::new(), 0);

        let job = processor
            .add_single_job(DocumentTask::new("/nonexistent/slow.pdf"))
            .await
            .unwrap();
        wait_until(|| processor.job(job.id).unwrap().status == JobStatus::Processing).await;

        processor.shutdown(Duration::from_secs(2)).await;
        assert_eq!(processor.job(job.id).unwrap().status, JobStatus::Completed);
    }
}
