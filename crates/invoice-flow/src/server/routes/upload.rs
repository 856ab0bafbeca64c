//! Upload endpoints feeding the work queue

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::unique_destination;
use crate::server::state::AppState;
use crate::types::{DocumentTask, JobStatus};

/// Response for a single queued upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
}

/// Response for a queued batch upload
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub success: bool,
    pub message: String,
    pub batch_id: Uuid,
    pub total_files: usize,
    pub files: Vec<String>,
}

/// POST /api/upload - Queue one PDF for extraction
pub async fn upload_single(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let input_dir = state.config().storage.input_dir.clone();
    let mut saved: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_request(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        if !is_pdf(&filename) {
            return Err(Error::invalid_request("Only PDF files are accepted"));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::invalid_request(format!("Failed to read '{}': {}", filename, e)))?;
        saved = Some(save_upload(&input_dir, &filename, &data).await?);
        break;
    }

    let path = saved.ok_or_else(|| Error::invalid_request("No file provided"))?;
    let job = state.processor().add_single_job(DocumentTask::new(path)).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("Queued for extraction. Poll /api/job/{} for progress.", job.id),
        job_id: job.id,
        filename: job.task.filename.clone(),
        status: job.status,
    }))
}

/// POST /api/batch/upload - Queue several PDFs as one batch
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>> {
    let input_dir = state.config().storage.input_dir.clone();
    let mut tasks = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_request(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        // Non-PDF parts are skipped rather than failing the whole batch
        if !is_pdf(&filename) {
            tracing::warn!("Skipping non-PDF upload: {}", filename);
            continue;
        }
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to read upload '{}': {}", filename, e);
                continue;
            }
        };
        let path = save_upload(&input_dir, &filename, &data).await?;
        tasks.push(DocumentTask::new(path));
    }

    if tasks.is_empty() {
        return Err(Error::invalid_request("No valid PDF files provided"));
    }

    let files: Vec<String> = tasks.iter().map(|t| t.filename.clone()).collect();
    let batch = state.processor().create_batch(tasks).await?;

    Ok(Json(BatchUploadResponse {
        success: true,
        message: format!("Batch created with {} files", files.len()),
        batch_id: batch.id,
        total_files: files.len(),
        files,
    }))
}

/// Uploaded names keep only their final path component, with spaces
/// replaced so downstream tooling gets clean filenames
fn sanitize_filename(name: &str) -> String {
    let name = name.replace(' ', "_");
    name.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("upload.pdf")
        .to_string()
}

fn is_pdf(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

async fn save_upload(dir: &Path, filename: &str, data: &[u8]) -> Result<PathBuf> {
    let path = unique_destination(dir, filename).await;
    tokio::fs::write(&path, data).await?;
    tracing::info!("Saved upload: {} ({} bytes)", path.display(), data.len());
    Ok(path)
}
