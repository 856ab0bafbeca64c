//! Configuration for the invoice extraction service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Queue and worker settings
    pub processing: ProcessingConfig,

    /// Extraction provider settings
    pub extraction: ExtractionConfig,

    /// Working directories
    pub storage: StorageConfig,

    /// Inbox directory scanning
    pub intake: IntakeConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub enable_cors: bool,

    /// Maximum upload body size in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: default_max_upload_size(),
        }
    }
}

fn default_max_upload_size() -> usize {
    50 * 1024 * 1024 // 50 MB
}

/// Queue and worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Seconds to wait between the end of one job and the start of the next
    pub delay_between_jobs_secs: f64,

    /// Maximum number of queued work items before submissions block
    pub queue_capacity: usize,

    /// How long shutdown waits for the worker to finish its current job
    pub shutdown_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            delay_between_jobs_secs: 2.0,
            queue_capacity: 1000,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ProcessingConfig {
    /// Inter-job delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_jobs_secs.max(0.0))
    }

    /// Shutdown timeout as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Extraction provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the extraction API
    pub base_url: String,

    /// Model used for extraction
    pub model: String,

    /// Maximum tokens in the extraction response
    pub max_tokens: u32,

    /// API key; falls back to the ANTHROPIC_API_KEY environment variable
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout in seconds; 0 disables the timeout
    #[serde(default)]
    pub request_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 16000,
            api_key: String::new(),
            request_timeout_secs: 0,
        }
    }
}

/// Working directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where uploads and inbox documents land
    pub input_dir: PathBuf,

    /// Where report artifacts are written
    pub reports_dir: PathBuf,

    /// Where source documents are archived after processing
    pub processed_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            reports_dir: PathBuf::from("./reports"),
            processed_dir: PathBuf::from("./processed"),
        }
    }
}

impl StorageConfig {
    /// Create the working directories if they are missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.input_dir)?;
        std::fs::create_dir_all(&self.reports_dir)?;
        std::fs::create_dir_all(&self.processed_dir)
    }
}

/// Inbox scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Enable the periodic inbox sweep
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between inbox scans
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_interval_secs: default_scan_interval(),
        }
    }
}

fn default_scan_interval() -> u64 {
    5
}
