//! Batch types and derived aggregate metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::job::{Job, JobSnapshot, JobStatus};

/// Batch status
///
/// There is no Failed variant: a batch whose members failed still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A group of jobs submitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,

    /// Member job ids in submission order
    pub job_ids: Vec<Uuid>,

    pub created_at: DateTime<Utc>,

    pub status: BatchStatus,
}

impl Batch {
    /// The id is supplied by the caller so member jobs can carry the
    /// back-reference before the batch record exists.
    pub fn new(id: Uuid, job_ids: Vec<Uuid>) -> Self {
        Self {
            id,
            job_ids,
            created_at: Utc::now(),
            status: BatchStatus::Pending,
        }
    }
}

/// Aggregate metrics derived from member job statuses on every read
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchMetrics {
    pub total: usize,

    /// Jobs that finished running, successfully or not
    pub completed: usize,

    pub successful: usize,

    pub failed: usize,

    /// floor(completed / total * 100); 0 for an empty batch
    pub progress_percent: u8,
}

impl BatchMetrics {
    pub fn from_statuses(statuses: &[JobStatus]) -> Self {
        let total = statuses.len();
        let successful = statuses.iter().filter(|s| **s == JobStatus::Completed).count();
        let failed = statuses.iter().filter(|s| **s == JobStatus::Failed).count();
        let completed = successful + failed;
        let progress_percent = if total == 0 {
            0
        } else {
            (completed * 100 / total) as u8
        };
        Self {
            total,
            completed,
            successful,
            failed,
            progress_percent,
        }
    }
}

/// Full batch view: the record, derived metrics, and member snapshots
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub created_at: String,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub successful_jobs: usize,
    pub failed_jobs: usize,
    pub progress: u8,
    pub jobs: Vec<JobSnapshot>,
}

impl BatchSummary {
    pub fn new(batch: &Batch, jobs: &[Job]) -> Self {
        let statuses: Vec<JobStatus> = jobs.iter().map(|j| j.status).collect();
        let metrics = BatchMetrics::from_statuses(&statuses);
        Self {
            batch_id: batch.id,
            status: batch.status,
            created_at: batch.created_at.to_rfc3339(),
            total_jobs: metrics.total,
            completed_jobs: metrics.completed,
            successful_jobs: metrics.successful,
            failed_jobs: metrics.failed,
            progress: metrics.progress_percent,
            jobs: jobs.iter().map(JobSnapshot::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_empty() {
        let metrics = BatchMetrics::from_statuses(&[]);
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.progress_percent, 0); // no division by zero
    }

    #[test]
    fn test_metrics_mixed() {
        let statuses = [
            JobStatus::Completed,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Pending,
        ];
        let metrics = BatchMetrics::from_statuses(&statuses);
        assert_eq!(metrics.total, 4);
        assert_eq!(metrics.completed, 3); // completed counts failures too
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.progress_percent, 75);
    }

    #[test]
    fn test_metrics_cancelled_not_counted() {
        let statuses = [JobStatus::Completed, JobStatus::Cancelled, JobStatus::Cancelled];
        let metrics = BatchMetrics::from_statuses(&statuses);
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.progress_percent, 33); // floor, not round
    }

    #[test]
    fn test_summary_from_jobs() {
        use crate::types::job::DocumentTask;

        let batch_id = Uuid::new_v4();
        let mut jobs = vec![
            Job::new(DocumentTask::new("/tmp/a.pdf"), Some(batch_id)),
            Job::new(DocumentTask::new("/tmp/b.pdf"), Some(batch_id)),
        ];
        jobs[0].status = JobStatus::Completed;

        let batch = Batch::new(batch_id, jobs.iter().map(|j| j.id).collect());
        let summary = BatchSummary::new(&batch, &jobs);
        assert_eq!(summary.batch_id, batch_id);
        assert_eq!(summary.total_jobs, 2);
        assert_eq!(summary.successful_jobs, 1);
        assert_eq!(summary.progress, 50);
        assert_eq!(summary.jobs.len(), 2);
        assert_eq!(summary.jobs[0].filename, "a.pdf"); // submission order
    }
}
