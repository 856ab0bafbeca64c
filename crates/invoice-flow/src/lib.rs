//! invoice-flow: rate-limited batch processing for AI-powered invoice
//! extraction
//!
//! Documents are queued and executed one at a time by a single background
//! worker, keeping the extraction API under its rate limits. Jobs and
//! batches live in an in-memory registry with batch metrics derived at read
//! time, and the HTTP layer exposes submission, progress polling,
//! cancellation, and report downloads.

pub mod config;
pub mod error;
pub mod processing;
pub mod providers;
pub mod server;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use processing::{BatchProcessor, IntakeSweeper, QueueStatus};
pub use types::{
    Batch, BatchStatus, BatchSummary, DocumentTask, ExtractionReport, InvoiceRecord, Job,
    JobStatus,
};
