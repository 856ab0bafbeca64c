//! Application state shared across request handlers

use std::sync::Arc;

use crate::config::Config;
use crate::processing::BatchProcessor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    processor: BatchProcessor,
}

impl AppState {
    pub fn new(config: Config, processor: BatchProcessor) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, processor }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.inner.processor
    }
}
