//! Single background worker that drains the work queue
//!
//! Concurrency is fixed at one worker on purpose: the inter-job delay is the
//! rate limit on the extraction API, and a second worker would defeat it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::error::Result;
use crate::providers::{DocumentExtractor, ReportExporter};
use crate::types::{Batch, ExtractionReport, Job};

use super::processor::{Shared, WorkItem};

/// Progress milestones for the stages of one extraction run
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_EXTRACTING: u8 = 30;
const PROGRESS_EXTRACTED: u8 = 70;
const PROGRESS_ARCHIVED: u8 = 90;

pub(crate) struct ExtractionWorker {
    shared: Arc<Shared>,
    extractor: Arc<dyn DocumentExtractor>,
    exporter: Arc<dyn ReportExporter>,
    delay: Duration,
    reports_dir: PathBuf,
    processed_dir: PathBuf,
}

impl ExtractionWorker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        extractor: Arc<dyn DocumentExtractor>,
        exporter: Arc<dyn ReportExporter>,
        delay: Duration,
        reports_dir: PathBuf,
        processed_dir: PathBuf,
    ) -> Self {
        Self {
            shared,
            extractor,
            exporter,
            delay,
            reports_dir,
            processed_dir,
        }
    }

    /// Drain the queue until the shutdown signal flips or all senders drop
    pub(crate) async fn run(
        self,
        mut receiver: mpsc::Receiver<WorkItem>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Extraction worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let item = tokio::select! {
                maybe = receiver.recv() => match maybe {
                    Some(item) => item,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            self.shared.queue_depth.fetch_sub(1, Ordering::SeqCst);

            let Some(job) = self.shared.store.begin_job(item.job_id) else {
                // Cancelled before it reached the worker; no delay charged
                tracing::debug!("Skipping queue entry for job {}", item.job_id);
                continue;
            };

            tracing::info!("Processing job {} ({})", job.id, job.task.filename);
            self.shared.store.set_progress(job.id, PROGRESS_STARTED);

            match self.execute(&job).await {
                Ok((report, artifact)) => {
                    let found = report.invoices_found;
                    self.shared.store.complete_job(job.id, report, artifact);
                    tracing::info!("Job {} completed: {} invoices found", job.id, found);
                }
                Err(e) => {
                    self.shared.store.fail_job(job.id, e.to_string());
                    tracing::error!("Job {} failed: {}", job.id, e);
                }
            }

            self.notify_job_complete(job.id);

            if let Some(batch_id) = item.batch_id {
                if let Some(batch) = self.shared.store.try_finish_batch(batch_id) {
                    tracing::info!("Batch {} completed", batch_id);
                    self.notify_batch_complete(&batch);
                }
            }

            // Rate limiting between executions, skipped when shutting down
            // or when nothing is waiting
            if !*shutdown.borrow()
                && self.shared.queue_depth.load(Ordering::SeqCst) > 0
                && !self.delay.is_zero()
            {
                tracing::debug!(
                    "Rate limiting: waiting {:.1}s before next job",
                    self.delay.as_secs_f64()
                );
                tokio::time::sleep(self.delay).await;
            }
        }

        tracing::info!("Extraction worker stopped");
    }

    /// One job body: extract, export when invoices were found, archive the
    /// source document
    async fn execute(&self, job: &Job) -> Result<(ExtractionReport, Option<PathBuf>)> {
        let store = &self.shared.store;

        store.set_progress(job.id, PROGRESS_EXTRACTING);
        let report = self.extractor.execute(&job.task).await?;
        store.set_progress(job.id, PROGRESS_EXTRACTED);

        let artifact = if report.invoices_found > 0 {
            Some(self.exporter.export(&report, &self.reports_dir).await?)
        } else {
            tracing::info!("Job {}: no invoices found, skipping export", job.id);
            None
        };

        self.archive_source(&job.task.source_path).await?;
        store.set_progress(job.id, PROGRESS_ARCHIVED);

        Ok((report, artifact))
    }

    /// Move the source document into the processed directory, renaming on
    /// collision the same way uploads are deduplicated
    async fn archive_source(&self, source: &Path) -> Result<()> {
        if tokio::fs::metadata(source).await.is_err() {
            tracing::debug!("Source {} already gone, skipping archive", source.display());
            return Ok(());
        }
        let name = source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document.pdf");
        let dest = unique_destination(&self.processed_dir, name).await;
        tokio::fs::rename(source, &dest).await?;
        tracing::debug!("Archived {} -> {}", source.display(), dest.display());
        Ok(())
    }

    fn notify_job_complete(&self, job_id: Uuid) {
        let Some(job) = self.shared.store.job(job_id) else {
            return;
        };
        let callbacks = self.shared.subscribers.on_job_complete.lock();
        for callback in callbacks.iter() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&job))) {
                tracing::warn!("Job completion callback panicked: {:?}", panic);
            }
        }
    }

    fn notify_batch_complete(&self, batch: &Batch) {
        let callbacks = self.shared.subscribers.on_batch_complete.lock();
        for callback in callbacks.iter() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(batch))) {
                tracing::warn!("Batch completion callback panicked: {:?}", panic);
            }
        }
    }
}

/// Pick a path inside `dir` that does not collide with an existing file,
/// appending `_1`, `_2`, ... before the extension until one is free
pub async fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if tokio::fs::metadata(&candidate).await.is_err() {
        return candidate;
    }
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if tokio::fs::metadata(&candidate).await.is_err() {
            return candidate;
        }
        counter += 1;
    }
}
