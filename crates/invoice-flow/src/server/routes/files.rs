//! Artifact download and processing history endpoints

use axum::{
    extract::{Path as UrlPath, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Source documents archived after processing
    pub processed: Vec<String>,

    /// Report artifacts available for download
    pub reports: Vec<String>,
}

/// GET /api/download/:filename - Fetch a report artifact
pub async fn download(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<impl IntoResponse> {
    // Artifact names never contain separators
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(Error::invalid_request("Invalid filename"));
    }

    let path = state.config().storage.reports_dir.join(&filename);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| Error::FileNotFound(filename.clone()))?;

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    let headers = [
        (header::CONTENT_TYPE, mime.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, data))
}

/// GET /api/history - Processed documents and generated artifacts
pub async fn history(State(state): State<AppState>) -> Result<Json<HistoryResponse>> {
    let processed = list_dir(&state.config().storage.processed_dir).await?;
    let reports = list_dir(&state.config().storage.reports_dir).await?;
    Ok(Json(HistoryResponse { processed, reports }))
}

/// Sorted filenames in a directory; missing directories read as empty
async fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(names),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
