//! Background tasks and scheduled jobs.
//!
//! Each long-running task accepts a [`CancellationToken`] for graceful
//! shutdown.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod job_poller;
pub mod job_sync;
