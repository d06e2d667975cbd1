//! # Ragmate Knowledge
//!
//! Document lifecycle for the remote knowledge base:
//!
//! - [`ledger`] — the ordered list of document records the host believes are
//!   attached. Single-writer behind a mutex; file-backed or in-memory.
//! - [`documents`] — upload (validate, origin upload, attach with the fixed
//!   chunking policy, ledger append) and two-phase delete (detach, then
//!   best-effort origin delete, then ledger remove).

pub mod documents;
pub mod ledger;

pub use documents::{DeleteOutcome, DocumentManager, MimePolicy, NewUpload};
pub use ledger::{FileLedger, Ledger, MemLedger};
