//! # Ragmate Core
//!
//! Shared foundation for the Ragmate knowledge-base orchestration layer:
//! configuration, the error taxonomy, and the domain types exchanged
//! between the vector-service client and the document lifecycle manager.

pub mod config;
pub mod error;
pub mod types;

pub use config::RagmateConfig;
pub use error::{RagmateError, Result};
