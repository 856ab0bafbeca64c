//! External collaborators: the extraction provider and the report exporter

pub mod claude;
pub mod export;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{DocumentTask, ExtractionReport};

/// Provider performing the slow, rate-limited extraction
///
/// Called exactly once per job, only from the worker, with no timeout
/// imposed by the caller.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn execute(&self, task: &DocumentTask) -> Result<ExtractionReport>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Sink that turns a finished report into a persisted artifact
#[async_trait]
pub trait ReportExporter: Send + Sync {
    /// Write an artifact for the report into `dest_dir`, returning its path
    async fn export(&self, report: &ExtractionReport, dest_dir: &Path) -> Result<PathBuf>;
}

pub use claude::ClaudeExtractor;
pub use export::CsvReportExporter;
