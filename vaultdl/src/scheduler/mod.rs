//! Job scheduling.
//!
//! [`Scheduler`] owns the pending queue and the active set; a [`JobRunner`]
//! does the actual work for each admitted job.

mod handle;
mod service;

pub use handle::{JobHandle, ProcessHandle, StartingHandle};
pub use service::{JobContext, JobRunner, Scheduler, SchedulerDeps};
