//! Recurring trigger for the import pipeline.

mod host;
mod import_job;

pub use host::{JobCallback, SchedulerHost, TokioSchedulerHost};
pub use import_job::{ImportScheduler, SchedulerState, HOOK_NAME};
