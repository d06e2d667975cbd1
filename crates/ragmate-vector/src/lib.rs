//! # Ragmate Vector Client
//!
//! Talks to the remote vector-search service (OpenAI-style `/vector_stores`
//! and `/files` endpoints). Three layers, bottom up:
//!
//! - [`transport`] — authenticated HTTP with JSON/multipart auto-select and
//!   a typed error on non-2xx. No hidden retries.
//! - [`retry`] — explicit exponential-backoff policy for 429/5xx/network
//!   failures, layered on top of the transport by callers that want it.
//! - [`registry`] / [`retrieve`] — idempotent-by-name store resolution and
//!   scored similarity search with result shaping.

pub mod registry;
pub mod retrieve;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use registry::StoreRegistry;
pub use retrieve::Retriever;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Method, Payload, Transport};
