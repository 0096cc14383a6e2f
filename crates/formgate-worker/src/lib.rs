//! Formgate Worker Library
//!
//! The durable background-job runtime: a Postgres-backed queue with three
//! priority bands, the four cleanup workers, and the daily scheduler that
//! feeds retention jobs into it.

pub mod context;
pub mod queue;
pub mod scheduler;
pub mod workers;

pub use context::WorkerContext;
pub use queue::{JobQueue, JobQueueConfig, QUEUE_CRITICAL, QUEUE_DEFAULT, QUEUE_LOW};
pub use scheduler::start_retention_scheduler;
pub use workers::{
    DeleteFormFilesArgs, DeleteSubmissionFilesArgs, OrphanScanArgs, RetentionCleanupArgs,
};
