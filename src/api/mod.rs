//! HTTP API for the task tracker.
//!
//! Every route is wrapped by the admission limiter in [`rate_limit`].

mod export;
pub mod rate_limit;
pub mod routes;
mod tasks;
pub mod types;

pub use routes::{router, serve, AppState};
