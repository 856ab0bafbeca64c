//! Periodic inbox scan that feeds new documents into the work queue

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::IntakeConfig;
use crate::error::Result;
use crate::types::DocumentTask;

use super::processor::BatchProcessor;

/// Watches the inbox directory and submits newly arrived PDFs as single jobs
///
/// Files are tracked by path between sweeps, so a document is queued once
/// and picked up again only after the worker has archived it away.
pub struct IntakeSweeper {
    processor: BatchProcessor,
    input_dir: PathBuf,
    interval: Duration,
}

impl IntakeSweeper {
    pub fn new(processor: BatchProcessor, input_dir: PathBuf, config: &IntakeConfig) -> Self {
        Self {
            processor,
            input_dir,
            interval: Duration::from_secs(config.scan_interval_secs.max(1)),
        }
    }

    /// Spawn the sweep loop; it stops when the processor shuts down
    pub fn spawn(self) -> JoinHandle<()> {
        let mut shutdown = self.processor.shutdown_signal();
        tokio::spawn(async move {
            tracing::info!(
                "Intake sweeper started: watching {} every {:?}",
                self.input_dir.display(),
                self.interval
            );
            let mut ticker = tokio::time::interval(self.interval);
            let mut seen: HashSet<PathBuf> = HashSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if let Err(e) = self.sweep(&mut seen).await {
                    tracing::warn!("Inbox sweep failed: {}", e);
                }
            }

            tracing::info!("Intake sweeper stopped");
        })
    }

    async fn sweep(&self, seen: &mut HashSet<PathBuf>) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.input_dir).await?;
        let mut current = HashSet::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if !is_pdf || !entry.file_type().await?.is_file() {
                continue;
            }
            current.insert(path.clone());
            if seen.contains(&path) {
                continue;
            }

            match self.processor.add_single_job(DocumentTask::new(path.clone())).await {
                Ok(job) => {
                    tracing::info!("Inbox pickup: {} queued as job {}", job.task.filename, job.id);
                    seen.insert(path);
                }
                Err(e) => tracing::warn!("Failed to queue {}: {}", path.display(), e),
            }
        }

        // Drop files the worker has archived so a re-upload under the same
        // name is noticed again
        seen.retain(|p| current.contains(p));
        Ok(())
    }
}
