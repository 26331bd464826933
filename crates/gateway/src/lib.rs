//! HTTP transport for the scheduler.
//!
//! [`Scheduler`] is the full operation set. [`server`] exposes any scheduler
//! over HTTP and [`client::HttpClient`] talks to one, so a host can be written
//! against an in-process [`cadence_cron::Cron`] or a remote one alike.

pub mod client;
pub mod error;
pub mod scheduler;
pub mod server;

pub use {
    client::HttpClient,
    error::{Error, Result},
    scheduler::Scheduler,
    server::{build_router, serve, start_server},
};
