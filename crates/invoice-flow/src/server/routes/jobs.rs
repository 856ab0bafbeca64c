//! Job tracking and queue status endpoints

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
use crate::types::{DashboardMetrics, JobSnapshot};

/// One extracted invoice in a job's results
#[derive(Debug, Serialize)]
pub struct JobInvoiceRow {
    pub fields: Map<String, Value>,
    pub line_items: Value,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Extraction results for a completed job
#[derive(Debug, Serialize)]
pub struct JobResultsResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub filename: String,
    pub vendor: String,
    pub template_created: bool,
    pub invoices_found: usize,
    pub invoices_valid: usize,
    pub is_valid: bool,
    pub invoices: Vec<JobInvoiceRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    pub dashboard: DashboardMetrics,
}

/// GET /api/job/:id - Job status and progress
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>> {
    state
        .processor()
        .job(job_id)
        .map(|job| Json(JobSnapshot::from(&job)))
        .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
}

/// GET /api/job/:id/results - Invoices extracted by a completed job
pub async fn get_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResultsResponse>> {
    let job = state
        .processor()
        .job(job_id)
        .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
    let report = job.result.as_ref().ok_or_else(|| {
        Error::invalid_request(format!(
            "Job {} has no results yet (status: {})",
            job_id, job.status
        ))
    })?;

    let invoices = report
        .invoices
        .iter()
        .map(|invoice| JobInvoiceRow {
            fields: invoice.fields.clone(),
            line_items: invoice
                .fields
                .get("line_items")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            is_valid: invoice.is_valid,
            errors: invoice.errors.clone(),
        })
        .collect();

    Ok(Json(JobResultsResponse {
        success: true,
        job_id,
        filename: job.task.filename.clone(),
        vendor: report.vendor.clone(),
        template_created: report.template_created,
        invoices_found: report.invoices_found,
        invoices_valid: report.invoices_valid,
        is_valid: report.is_valid,
        invoices,
        report_file: job.artifact_name(),
        dashboard: DashboardMetrics::from_invoices(report.invoices.iter()),
    }))
}

/// GET /api/queue/status - Queue depth and totals
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.processor().queue_status())
}
