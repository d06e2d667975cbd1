//! Idempotent-by-name vector-store resolution.
//!
//! The remote service does not enforce name uniqueness, so a bare
//! list-then-create is racy: two concurrent callers can both miss and both
//! create. The registry closes that race locally with a per-name
//! single-flight lock plus a resolved-id cache — concurrent callers for the
//! same name collapse onto one remote resolution and all receive the same id.

use crate::retry::RetryPolicy;
use crate::transport::{Method, Payload, Transport};
use ragmate_core::error::{RagmateError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stores are listed in pages of up to this many; one page is enough for
/// the handful of stores a knowledge base keeps.
const LIST_LIMIT: u32 = 100;

pub struct StoreRegistry {
    transport: Arc<dyn Transport>,
    api_base: String,
    retry: RetryPolicy,
    /// name -> resolved id.
    cache: Mutex<HashMap<String, String>>,
    /// Per-name single-flight guards.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StoreRegistry {
    pub fn new(transport: Arc<dyn Transport>, api_base: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            retry,
            cache: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache with a previously persisted id (e.g. from config),
    /// skipping the list call on the next resolution.
    pub async fn prime(&self, name: impl Into<String>, id: impl Into<String>) {
        self.cache.lock().await.insert(name.into(), id.into());
    }

    /// Drop the cached id for `name` so the next call re-resolves remotely.
    pub async fn invalidate(&self, name: &str) {
        self.cache.lock().await.remove(name);
    }

    /// Resolve a store name to its id, creating the store if absent.
    ///
    /// Repeated calls with the same name return the same id. Concurrent
    /// callers are serialized per name, so at most one create is issued.
    pub async fn get_or_create(&self, name: &str, initial_file_ids: &[String]) -> Result<String> {
        let guard = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _flight = guard.lock().await;

        if let Some(id) = self.cache.lock().await.get(name) {
            return Ok(id.clone());
        }

        let id = match self.find_by_name(name).await? {
            Some(id) => id,
            None => self.create(name, initial_file_ids).await?,
        };
        self.cache.lock().await.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Scan the store listing for an exact name match. First listed wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/vector_stores?limit={LIST_LIMIT}", self.api_base);
        let listing = self
            .retry
            .run("list vector stores", || {
                self.transport.request(Method::Get, &url, Payload::None)
            })
            .await?;

        let stores = listing["data"].as_array().cloned().unwrap_or_default();
        for store in &stores {
            if store["name"].as_str() == Some(name) {
                let id = store["id"].as_str().ok_or_else(|| RagmateError::Transport {
                    status: 200,
                    body: "Store listing entry has no id".into(),
                })?;
                tracing::debug!("Resolved vector store '{name}' -> {id}");
                return Ok(Some(id.to_string()));
            }
        }
        Ok(None)
    }

    async fn create(&self, name: &str, initial_file_ids: &[String]) -> Result<String> {
        let url = format!("{}/vector_stores", self.api_base);
        let body = json!({
            "name": name,
            "file_ids": initial_file_ids,
        });
        // Create is not idempotent, so it runs once without retry.
        let created = self
            .transport
            .request(Method::Post, &url, Payload::Json(body))
            .await?;

        let id = created["id"].as_str().ok_or_else(|| RagmateError::Transport {
            status: 200,
            body: "Create-store response has no id".into(),
        })?;
        tracing::info!("Created vector store '{name}' ({id})");
        Ok(id.to_string())
    }
}
