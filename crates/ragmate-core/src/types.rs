//! Domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A remote vector store as resolved by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorStore {
    /// Opaque service-assigned id (e.g. `vs_...`).
    pub id: String,
    /// Human-readable logical name. At most one live store per name.
    pub name: String,
}

/// A document record in the metadata ledger.
///
/// Created only after both the origin upload and the vector-store attach
/// succeed; removed only after a successful detach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Id of the raw uploaded file on the service's file-storage side.
    pub origin_file_id: String,
    /// Sanitized file name as shown to the user.
    pub name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// One similarity-search hit, shaped for the caller. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// First text chunk of the hit, or empty if the service returned none.
    pub content: String,
    /// Similarity score in [0, 1]; 0 when the service omitted it.
    pub score: f64,
    /// Service-side attributes attached to the chunk (filename, custom tags).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// A similarity query against the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    /// Maximum number of hits to request from the service.
    pub max_results: u32,
    /// Minimum score a hit must reach when filtering is enabled.
    pub score_threshold: f64,
    /// Whether to drop hits below `score_threshold`.
    pub apply_threshold: bool,
}

impl Query {
    /// A query with the standard defaults (5 results, 0.7 threshold, filtering on).
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: 5,
            score_threshold: 0.7,
            apply_threshold: true,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Disable score filtering and return every hit the service produced.
    pub fn unfiltered(mut self) -> Self {
        self.apply_threshold = false;
        self
    }
}
