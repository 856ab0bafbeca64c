//! Core types: jobs, batches, and extraction reports

pub mod batch;
pub mod job;
pub mod report;

pub use batch::{Batch, BatchMetrics, BatchStatus, BatchSummary};
pub use job::{DocumentTask, Job, JobSnapshot, JobStatus};
pub use report::{DashboardMetrics, ExtractionReport, InvoiceRecord};
