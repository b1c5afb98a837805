//! # Task Tracker
//!
//! An HTTP service for creating, reading, updating, deleting and exporting
//! tasks, backed by SQLite.
//!
//! Two pieces run alongside the CRUD handlers:
//!
//! ```text
//!   request ──► ┌────────────────────┐ ──► CRUD / export handlers ──┐
//!               │ AdmissionLimiter   │                              │
//!               │ (per-client window)│                              ▼
//!               └────────────────────┘                    ┌──────────────────┐
//!                                                         │    TaskStore     │
//!   every interval ──► Reconciler ──────────────────────► │    (SQLite)      │
//!                      (priority / overdue from due date) └──────────────────┘
//! ```
//!
//! ## Modules
//! - `api`: axum routes, rate-limit middleware, export
//! - `limiter`: per-client fixed-window admission limiter
//! - `reconciler`: periodic re-derivation of priority and overdue status
//! - `store`: `TaskStore` trait and the SQLite implementation
//! - `task`: task records and due-date policy
//! - `config`: environment configuration

pub mod api;
pub mod config;
pub mod limiter;
pub mod reconciler;
pub mod store;
pub mod task;

pub use config::Config;
