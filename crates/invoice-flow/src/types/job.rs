//! Job lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::report::ExtractionReport;

/// Description of one document to extract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTask {
    /// Where the document currently lives on disk
    pub source_path: PathBuf,

    /// Original filename, used for reporting and artifact naming
    pub filename: String,
}

impl DocumentTask {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let filename = source_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        Self {
            source_path,
            filename,
        }
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, Failed and Cancelled never transition further
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single document extraction job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,

    /// The document this job will extract
    pub task: DocumentTask,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    /// Set when the worker picks the job up
    pub started_at: Option<DateTime<Utc>>,

    /// Set on the transition into a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// 0-100, never decreases while the job is processing
    pub progress: u8,

    /// Present only after a successful run
    pub result: Option<ExtractionReport>,

    /// Report artifact written by the exporter, when invoices were found
    pub artifact_path: Option<PathBuf>,

    /// Present only after a failed run
    pub error: Option<String>,

    /// Owning batch, when the job was submitted as part of one
    pub batch_id: Option<Uuid>,
}

impl Job {
    pub fn new(task: DocumentTask, batch_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0,
            result: None,
            artifact_path: None,
            error: None,
            batch_id,
        }
    }

    /// Artifact filename for download links
    pub fn artifact_name(&self) -> Option<String> {
        self.artifact_path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .map(String::from)
    }
}

/// Serialized job view returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    pub invoices_found: usize,
    pub is_valid: Option<bool>,
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            filename: job.task.filename.clone(),
            status: job.status,
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            progress: job.progress,
            error: job.error.clone(),
            report_file: job.artifact_name(),
            invoices_found: job.result.as_ref().map(|r| r.invoices_found).unwrap_or(0),
            is_valid: job.result.as_ref().map(|r| r.is_valid),
            vendor: job.result.as_ref().map(|r| r.vendor.clone()),
            batch_id: job.batch_id,
        }
    }
}
