//! In-memory registry for jobs and batches
//!
//! All mutation happens under one short-held mutex. Reads clone snapshots
//! out so callers never hold the lock across an await point.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::{Batch, BatchStatus, BatchSummary, ExtractionReport, Job, JobStatus};

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<Uuid, Job>,
    batches: HashMap<Uuid, Batch>,
    /// Batch ids in creation order, for stable listings
    batch_order: Vec<Uuid>,
}

/// Registry of jobs and batches; the single source of truth for status reads
#[derive(Default)]
pub(crate) struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_job(&self, job: Job) {
        self.inner.lock().jobs.insert(job.id, job);
    }

    pub(crate) fn insert_batch(&self, batch: Batch) {
        let mut inner = self.inner.lock();
        inner.batch_order.push(batch.id);
        inner.batches.insert(batch.id, batch);
    }

    /// Snapshot of a single job
    pub(crate) fn job(&self, id: Uuid) -> Option<Job> {
        self.inner.lock().jobs.get(&id).cloned()
    }

    /// Snapshot of a single batch record
    pub(crate) fn batch(&self, id: Uuid) -> Option<Batch> {
        self.inner.lock().batches.get(&id).cloned()
    }

    /// Member job snapshots in submission order
    pub(crate) fn batch_jobs(&self, id: Uuid) -> Option<Vec<Job>> {
        let inner = self.inner.lock();
        let batch = inner.batches.get(&id)?;
        Some(Self::member_jobs(&inner, batch))
    }

    /// Full batch view with metrics derived from current member statuses
    pub(crate) fn batch_summary(&self, id: Uuid) -> Option<BatchSummary> {
        let inner = self.inner.lock();
        let batch = inner.batches.get(&id)?;
        let jobs = Self::member_jobs(&inner, batch);
        Some(BatchSummary::new(batch, &jobs))
    }

    /// All batches with metrics, in creation order
    pub(crate) fn batch_summaries(&self) -> Vec<BatchSummary> {
        let inner = self.inner.lock();
        inner
            .batch_order
            .iter()
            .filter_map(|id| {
                let batch = inner.batches.get(id)?;
                let jobs = Self::member_jobs(&inner, batch);
                Some(BatchSummary::new(batch, &jobs))
            })
            .collect()
    }

    fn member_jobs(inner: &StoreInner, batch: &Batch) -> Vec<Job> {
        batch
            .job_ids
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    /// Cancel every still-pending member, then the batch itself.
    ///
    /// Jobs already running or finished are left untouched; a running member
    /// is allowed to finish even though the batch is cancelled. Returns
    /// false when the batch id is unknown.
    pub(crate) fn cancel_batch(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        let Some(batch) = inner.batches.get(&id) else {
            return false;
        };
        let member_ids = batch.job_ids.clone();
        for job_id in member_ids {
            if let Some(job) = inner.jobs.get_mut(&job_id) {
                if job.status == JobStatus::Pending {
                    job.status = JobStatus::Cancelled;
                    job.completed_at = Some(Utc::now());
                }
            }
        }
        if let Some(batch) = inner.batches.get_mut(&id) {
            batch.status = BatchStatus::Cancelled;
        }
        true
    }

    /// Move a pending job to processing and bump its pending batch along.
    ///
    /// Returns the job snapshot, or None when the job is missing or no
    /// longer pending, in which case the caller skips the queue entry.
    pub(crate) fn begin_job(&self, job_id: Uuid) -> Option<Job> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get_mut(&job_id)?;
        if job.status != JobStatus::Pending {
            return None;
        }
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        let snapshot = job.clone();
        if let Some(batch_id) = snapshot.batch_id {
            if let Some(batch) = inner.batches.get_mut(&batch_id) {
                if batch.status == BatchStatus::Pending {
                    batch.status = BatchStatus::Processing;
                }
            }
        }
        Some(snapshot)
    }

    /// Record a successful run
    pub(crate) fn complete_job(
        &self,
        job_id: Uuid,
        report: ExtractionReport,
        artifact: Option<PathBuf>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.progress = 100;
            job.result = Some(report);
            job.artifact_path = artifact;
        }
    }

    /// Record a failed run; progress keeps its last value
    pub(crate) fn fail_job(&self, job_id: Uuid, error: impl Into<String>) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.error = Some(error.into());
        }
    }

    /// Bump progress on a processing job; values never go backwards
    pub(crate) fn set_progress(&self, job_id: Uuid, progress: u8) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            if job.status == JobStatus::Processing && progress > job.progress {
                job.progress = progress.min(100);
            }
        }
    }

    /// Mark the batch completed once every member is terminal.
    ///
    /// Cancelled batches keep their status even when a member that was
    /// already running finishes afterwards. Returns the batch snapshot only
    /// when this call performed the transition.
    pub(crate) fn try_finish_batch(&self, batch_id: Uuid) -> Option<Batch> {
        let mut inner = self.inner.lock();
        let batch = inner.batches.get(&batch_id)?;
        if batch.status.is_terminal() {
            return None;
        }
        let all_terminal = batch.job_ids.iter().all(|id| {
            inner
                .jobs
                .get(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(true)
        });
        if !all_terminal {
            return None;
        }
        let batch = inner.batches.get_mut(&batch_id)?;
        batch.status = BatchStatus::Completed;
        Some(batch.clone())
    }

    /// (batch count, job count) for queue status reporting
    pub(crate) fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.batches.len(), inner.jobs.len())
    }
}
