//! API routes for the batch extraction service

pub mod batches;
pub mod files;
pub mod jobs;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Uploads get a larger body limit
        .route(
            "/upload",
            post(upload::upload_single).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/batch/upload",
            post(upload::upload_batch).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Batch tracking
        .route("/batch/:id", get(batches::get_batch))
        .route("/batch/:id/results", get(batches::get_batch_results))
        .route("/batch/:id/cancel", post(batches::cancel_batch))
        .route("/batches", get(batches::list_batches))
        // Job tracking
        .route("/job/:id", get(jobs::get_job))
        .route("/job/:id/results", get(jobs::get_job_results))
        .route("/queue/status", get(jobs::queue_status))
        // Artifacts
        .route("/download/:filename", get(files::download))
        .route("/history", get(files::history))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> Json<Value> {
    Json(json!({
        "name": "invoice-flow",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Rate-limited batch processing for AI-powered invoice extraction",
        "endpoints": {
            "POST /api/upload": "Queue a single PDF for extraction",
            "POST /api/batch/upload": "Queue multiple PDFs as one batch",
            "GET /api/batch/:id": "Batch status with per-job progress",
            "GET /api/batch/:id/results": "Aggregated invoices for a batch",
            "POST /api/batch/:id/cancel": "Cancel a batch's pending jobs",
            "GET /api/batches": "List all batches",
            "GET /api/job/:id": "Job status and progress",
            "GET /api/job/:id/results": "Invoices extracted by a job",
            "GET /api/queue/status": "Queue depth and totals",
            "GET /api/download/:filename": "Download a report artifact",
            "GET /api/history": "Processed documents and report artifacts"
        }
    }))
}
