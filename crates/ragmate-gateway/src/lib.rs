//! # Ragmate Gateway
//!
//! The host-facing HTTP surface: upload, delete, list, and search endpoints
//! over the knowledge-base core. Maps each tagged core error to an HTTP
//! status and a human-readable message; internals (raw bodies, orphaned
//! resource ids) go to the log, never into a response.

pub mod routes;
pub mod server;

pub use server::{serve, AppState};
