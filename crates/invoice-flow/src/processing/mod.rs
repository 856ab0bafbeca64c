//! Batch scheduling: job store, work queue, and the rate-limited worker

mod intake;
mod processor;
mod store;
mod worker;

pub use intake::IntakeSweeper;
pub use processor::{BatchProcessor, QueueStatus};
pub use worker::unique_destination;
