//! Metadata ledger — the ordered list of documents the host believes are
//! attached to the vector store.
//!
//! The core appends and removes entries but does not own durable storage
//! policy; the trait keeps that seam open. Both implementations serialize
//! every read-modify-write behind a mutex so concurrent uploads and deletes
//! cannot lose updates.

use ragmate_core::error::{RagmateError, Result};
use ragmate_core::types::Document;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait Ledger: Send + Sync {
    /// All records, oldest first.
    fn all(&self) -> Result<Vec<Document>>;

    fn append(&self, document: Document) -> Result<()>;

    /// Remove the entry with the given origin file id. Returns `false` when
    /// no entry matched — removing an absent id is not an error.
    fn remove(&self, origin_file_id: &str) -> Result<bool>;
}

/// In-memory ledger for tests and embedded callers.
#[derive(Default)]
pub struct MemLedger {
    entries: Mutex<Vec<Document>>,
}

impl MemLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemLedger {
    fn all(&self) -> Result<Vec<Document>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn append(&self, document: Document) -> Result<()> {
        self.entries.lock().unwrap().push(document);
        Ok(())
    }

    fn remove(&self, origin_file_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|d| d.origin_file_id != origin_file_id);
        Ok(entries.len() != before)
    }
}

/// File-backed ledger — documents saved as pretty JSON, human-readable and
/// git-friendly. Reads once on open, writes through on every mutation.
pub struct FileLedger {
    path: PathBuf,
    entries: Mutex<Vec<Document>>,
}

impl FileLedger {
    /// Open (or start) the ledger at `dir/documents.json`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("documents.json");
        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)
                .map_err(|e| RagmateError::Ledger(format!("Failed to parse {}: {e}", path.display())))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Default ledger directory (~/.ragmate).
    pub fn default_dir() -> PathBuf {
        ragmate_core::config::RagmateConfig::home_dir()
    }

    fn persist(&self, entries: &[Document]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| RagmateError::Ledger(format!("Serialize error: {e}")))?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("Saved {} ledger entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn all(&self) -> Result<Vec<Document>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn append(&self, document: Document) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.push(document);
        self.persist(&entries)
    }

    fn remove(&self, origin_file_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|d| d.origin_file_id != origin_file_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }
}
