//! Batch tracking endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::QueueStatus;
use crate::server::state::AppState;
use crate::types::{BatchStatus, BatchSummary, DashboardMetrics, InvoiceRecord, JobStatus};

/// One extracted invoice with the file it came from
#[derive(Debug, Serialize)]
pub struct InvoiceRow {
    pub source_file: String,
    pub fields: Map<String, Value>,
    pub line_items: Value,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl InvoiceRow {
    fn new(source_file: &str, invoice: &InvoiceRecord) -> Self {
        Self {
            source_file: source_file.to_string(),
            line_items: invoice
                .fields
                .get("line_items")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            fields: invoice.fields.clone(),
            is_valid: invoice.is_valid,
            errors: invoice.errors.clone(),
        }
    }
}

/// Per-file status line in the batch results
#[derive(Debug, Serialize)]
pub struct BatchFileStatus {
    pub filename: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    pub invoices_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated batch results
#[derive(Debug, Serialize)]
pub struct BatchResultsResponse {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub progress: u8,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub vendors: Vec<String>,
    pub invoices: Vec<InvoiceRow>,
    pub dashboard: DashboardMetrics,
    pub files: Vec<BatchFileStatus>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchListResponse {
    pub batches: Vec<BatchSummary>,
    pub queue_status: QueueStatus,
}

/// GET /api/batch/:id - Batch status with per-job snapshots
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchSummary>> {
    state
        .processor()
        .batch_summary(batch_id)
        .map(Json)
        .ok_or_else(|| Error::BatchNotFound(batch_id.to_string()))
}

/// GET /api/batch/:id/results - Aggregated invoices across the batch
pub async fn get_batch_results(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchResultsResponse>> {
    let summary = state
        .processor()
        .batch_summary(batch_id)
        .ok_or_else(|| Error::BatchNotFound(batch_id.to_string()))?;
    let jobs = state
        .processor()
        .batch_jobs(batch_id)
        .ok_or_else(|| Error::BatchNotFound(batch_id.to_string()))?;

    let mut vendors = Vec::new();
    let mut invoices = Vec::new();
    let mut records = Vec::new();
    for job in &jobs {
        if let Some(report) = &job.result {
            if !report.vendor.is_empty() && !vendors.contains(&report.vendor) {
                vendors.push(report.vendor.clone());
            }
            for invoice in &report.invoices {
                invoices.push(InvoiceRow::new(&job.task.filename, invoice));
                records.push(invoice);
            }
        }
    }
    let dashboard = DashboardMetrics::from_invoices(records.into_iter());

    let files = jobs
        .iter()
        .map(|job| BatchFileStatus {
            filename: job.task.filename.clone(),
            status: job.status,
            report_file: job.artifact_name(),
            invoices_found: job.result.as_ref().map(|r| r.invoices_found).unwrap_or(0),
            error: job.error.clone(),
        })
        .collect();

    Ok(Json(BatchResultsResponse {
        batch_id,
        status: summary.status,
        progress: summary.progress,
        total_files: summary.total_jobs,
        successful_files: summary.successful_jobs,
        failed_files: summary.failed_jobs,
        vendors,
        invoices,
        dashboard,
        files,
    }))
}

/// POST /api/batch/:id/cancel - Cancel the batch's pending jobs
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<CancelResponse>> {
    if !state.processor().cancel_batch(batch_id) {
        return Err(Error::BatchNotFound(batch_id.to_string()));
    }
    Ok(Json(CancelResponse {
        success: true,
        message: format!("Batch {} cancelled; running jobs will finish", batch_id),
    }))
}

/// GET /api/batches - All batches plus queue health
pub async fn list_batches(State(state): State<AppState>) -> Json<BatchListResponse> {
    Json(BatchListResponse {
        batches: state.processor().batches(),
        queue_status: state.processor().queue_status(),
    })
}
