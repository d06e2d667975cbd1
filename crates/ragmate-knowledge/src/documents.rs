//! Document lifecycle manager.
//!
//! Upload is a strict sequence: validate locally, upload to the origin file
//! store, resolve the vector store, attach via batch ingestion, and only
//! then append to the ledger. An attach failure after a successful upload
//! leaves an origin file with no attachment record — that inconsistent state
//! is surfaced as a `Consistency` error carrying the orphaned id, never
//! swallowed.
//!
//! Delete is two-phase: detach first (a failure here aborts with the ledger
//! untouched), then a best-effort origin delete, then the ledger removal.
//! Deleting an id the store no longer knows is a no-op success.

use chrono::Utc;
use ragmate_core::error::{RagmateError, Result, Stage};
use ragmate_core::types::Document;
use ragmate_vector::registry::StoreRegistry;
use ragmate_vector::retry::RetryPolicy;
use ragmate_vector::transport::{Method, Payload, Transport};
use serde_json::json;
use std::sync::Arc;

use crate::ledger::Ledger;

/// Fixed chunking policy for batch ingestion. Half-overlap trades storage
/// for retrieval quality.
const MAX_CHUNK_SIZE_TOKENS: u32 = 800;
const CHUNK_OVERLAP_TOKENS: u32 = 400;

/// An inbound file as received from the host, before validation.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub bytes: Vec<u8>,
    pub declared_name: String,
    pub declared_mime: String,
}

/// Table-driven MIME allow-list. Plain text is the only seeded entry; new
/// types are admitted with [`MimePolicy::permit`], not by editing call sites.
#[derive(Debug, Clone)]
pub struct MimePolicy {
    allowed: Vec<String>,
}

impl Default for MimePolicy {
    fn default() -> Self {
        Self {
            allowed: vec!["text/plain".into()],
        }
    }
}

impl MimePolicy {
    pub fn permit(mut self, mime: impl Into<String>) -> Self {
        self.allowed.push(mime.into());
        self
    }

    pub fn check(&self, mime: &str) -> Result<()> {
        if self.allowed.iter().any(|m| m == mime) {
            Ok(())
        } else {
            Err(RagmateError::Validation(format!(
                "Unsupported file type '{mime}' (allowed: {})",
                self.allowed.join(", ")
            )))
        }
    }
}

/// Strip path components and unsafe characters from a declared file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Outcome of a two-phase delete. `origin_deleted` is best-effort and may be
/// false while the delete as a whole still succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// False when the store had already forgotten the file (no-op delete).
    pub detached: bool,
    pub origin_deleted: bool,
    pub removed_from_ledger: bool,
}

pub struct DocumentManager {
    transport: Arc<dyn Transport>,
    api_base: String,
    registry: Arc<StoreRegistry>,
    store_name: String,
    ledger: Arc<dyn Ledger>,
    mime_policy: MimePolicy,
    retry: RetryPolicy,
}

impl DocumentManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base: impl Into<String>,
        registry: Arc<StoreRegistry>,
        store_name: impl Into<String>,
        ledger: Arc<dyn Ledger>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            registry,
            store_name: store_name.into(),
            ledger,
            mime_policy: MimePolicy::default(),
            retry,
        }
    }

    pub fn with_mime_policy(mut self, policy: MimePolicy) -> Self {
        self.mime_policy = policy;
        self
    }

    /// Documents currently recorded in the ledger, oldest first.
    pub fn documents(&self) -> Result<Vec<Document>> {
        self.ledger.all()
    }

    /// Resolve the knowledge-base store id (cached in the registry).
    pub async fn store_id(&self) -> Result<String> {
        self.registry.get_or_create(&self.store_name, &[]).await
    }

    /// Upload a file, attach it to the knowledge-base store, and record it.
    pub async fn upload(&self, upload: NewUpload) -> Result<Document> {
        if upload.bytes.is_empty() {
            return Err(RagmateError::Validation("No file uploaded".into()));
        }
        let name = sanitize_file_name(&upload.declared_name);
        self.mime_policy.check(&upload.declared_mime)?;

        let size_bytes = upload.bytes.len() as u64;
        let origin_file_id = self
            .upload_origin_file(name.clone(), upload.declared_mime, upload.bytes)
            .await?;

        // Anything that fails from here on leaves an uploaded-but-unattached
        // origin file behind; report it with the orphan id so the caller can
        // roll back or retry the attach.
        let store_id = self
            .registry
            .get_or_create(&self.store_name, &[])
            .await
            .map_err(|e| attach_inconsistency(&origin_file_id, format!("Store resolution failed: {e}")))?;

        self.attach(&store_id, &origin_file_id)
            .await
            .map_err(|e| attach_inconsistency(&origin_file_id, e.to_string()))?;

        let document = Document {
            origin_file_id,
            name,
            size_bytes,
            uploaded_at: Utc::now(),
        };
        self.ledger.append(document.clone())?;
        tracing::info!(
            "Uploaded '{}' ({} bytes) as {} into store {store_id}",
            document.name,
            document.size_bytes,
            document.origin_file_id
        );
        Ok(document)
    }

    /// Two-phase delete: detach, best-effort origin delete, ledger removal.
    pub async fn delete(&self, store_id: &str, origin_file_id: &str) -> Result<DeleteOutcome> {
        // Phase A — detach. A hard failure aborts with the ledger untouched:
        // never drop metadata for a file the store still thinks it has.
        let detach_url = format!(
            "{}/vector_stores/{store_id}/files/{origin_file_id}",
            self.api_base
        );
        let detached = match self
            .retry
            .run("detach file", || {
                self.transport.request(Method::Delete, &detach_url, Payload::None)
            })
            .await
        {
            Ok(_) => true,
            Err(err) if err.status() == Some(404) => false,
            Err(err) => {
                return Err(RagmateError::Consistency {
                    stage: Stage::Detach,
                    detail: format!("Detach of {origin_file_id} failed: {err}"),
                    orphan_file_id: None,
                });
            }
        };

        // Phase B — origin delete. Best-effort: a failure leaves the file
        // reachable but orphaned at the origin, which is reported, not fatal.
        let origin_url = format!("{}/files/{origin_file_id}", self.api_base);
        let origin_deleted = match self
            .retry
            .run("delete origin file", || {
                self.transport.request(Method::Delete, &origin_url, Payload::None)
            })
            .await
        {
            Ok(_) => true,
            Err(err) if err.status() == Some(404) => false,
            Err(err) => {
                tracing::warn!("Origin delete of {origin_file_id} failed, file orphaned: {err}");
                false
            }
        };

        // Phase C — ledger removal by exact id.
        let removed_from_ledger = self.ledger.remove(origin_file_id)?;
        tracing::info!(
            "Deleted {origin_file_id} (detached: {detached}, origin deleted: {origin_deleted})"
        );
        Ok(DeleteOutcome {
            detached,
            origin_deleted,
            removed_from_ledger,
        })
    }

    async fn upload_origin_file(&self, file_name: String, mime: String, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/files", self.api_base);
        let payload = Payload::File {
            file_name,
            mime,
            bytes,
            fields: vec![("purpose".into(), "assistants".into())],
        };
        // Upload is not idempotent, so no retry here.
        let response = self.transport.request(Method::Post, &url, payload).await?;
        response["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RagmateError::Transport {
                status: 200,
                body: "Upload response has no file id".into(),
            })
    }

    async fn attach(&self, store_id: &str, origin_file_id: &str) -> Result<()> {
        let url = format!("{}/vector_stores/{store_id}/file_batches", self.api_base);
        let body = json!({
            "file_ids": [origin_file_id],
            "chunking_strategy": {
                "type": "static",
                "static": {
                    "max_chunk_size_tokens": MAX_CHUNK_SIZE_TOKENS,
                    "chunk_overlap_tokens": CHUNK_OVERLAP_TOKENS,
                }
            }
        });
        self.transport
            .request(Method::Post, &url, Payload::Json(body))
            .await?;
        Ok(())
    }
}

fn attach_inconsistency(origin_file_id: &str, detail: String) -> RagmateError {
    RagmateError::Consistency {
        stage: Stage::Attach,
        detail,
        orphan_file_id: Some(origin_file_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemLedger;
    use ragmate_vector::mock::MockTransport;

    fn manager(transport: Arc<MockTransport>, ledger: Arc<MemLedger>) -> DocumentManager {
        let registry = Arc::new(StoreRegistry::new(
            transport.clone(),
            "https://api.test/v1",
            RetryPolicy::none(),
        ));
        DocumentManager::new(
            transport,
            "https://api.test/v1",
            registry,
            "KB",
            ledger,
            RetryPolicy::none(),
        )
    }

    fn happy_transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::new(|method, url, _payload| {
            match (method, url) {
                (Method::Post, u) if u.ends_with("/files") => {
                    Ok(json!({ "id": "file_abc" }))
                }
                (Method::Get, u) if u.contains("/vector_stores?") => {
                    Ok(json!({ "data": [ { "id": "vs_123", "name": "KB" } ] }))
                }
                (Method::Post, u) if u.ends_with("/file_batches") => {
                    Ok(json!({ "id": "vsfb_1", "status": "in_progress" }))
                }
                (Method::Delete, _) => Ok(json!({ "deleted": true })),
                _ => panic!("unexpected call: {} {url}", method.as_str()),
            }
        }))
    }

    fn txt_upload() -> NewUpload {
        NewUpload {
            bytes: b"Warranty covers two years.".to_vec(),
            declared_name: "manual.txt".into(),
            declared_mime: "text/plain".into(),
        }
    }

    #[test]
    fn sanitize_strips_paths_and_unsafe_chars() {
        assert_eq!(sanitize_file_name("manual.txt"), "manual.txt");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\report v2.txt"), "report-v2.txt");
        assert_eq!(sanitize_file_name("weird<>|name?.txt"), "weirdname.txt");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn mime_policy_is_extensible() {
        let policy = MimePolicy::default();
        assert!(policy.check("text/plain").is_ok());
        assert!(policy.check("text/markdown").is_err());

        let extended = MimePolicy::default().permit("text/markdown");
        assert!(extended.check("text/markdown").is_ok());
    }

    #[tokio::test]
    async fn rejects_disallowed_mime_before_any_network_call() {
        let transport = happy_transport();
        let manager = manager(transport.clone(), Arc::new(MemLedger::new()));

        let err = manager
            .upload(NewUpload {
                bytes: b"%PDF-1.4".to_vec(),
                declared_name: "doc.pdf".into(),
                declared_mime: "application/pdf".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RagmateError::Validation(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_empty_upload() {
        let transport = happy_transport();
        let manager = manager(transport.clone(), Arc::new(MemLedger::new()));
        let err = manager
            .upload(NewUpload {
                bytes: vec![],
                declared_name: "manual.txt".into(),
                declared_mime: "text/plain".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RagmateError::Validation(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_attaches_then_records_in_ledger() {
        let transport = happy_transport();
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport.clone(), ledger.clone());

        let document = manager.upload(txt_upload()).await.unwrap();
        assert_eq!(document.origin_file_id, "file_abc");
        assert_eq!(document.name, "manual.txt");
        assert_eq!(document.size_bytes, 26);

        let entries = ledger.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], document);

        // Multipart upload carried the purpose field.
        let upload_call = transport
            .calls()
            .into_iter()
            .find(|c| c.url.ends_with("/files"))
            .unwrap();
        match upload_call.payload {
            Payload::File { fields, file_name, .. } => {
                assert_eq!(file_name, "manual.txt");
                assert!(fields.contains(&("purpose".to_string(), "assistants".to_string())));
            }
            _ => panic!("origin upload should be multipart"),
        }

        // Attach used the fixed chunking policy.
        let attach_call = transport
            .calls()
            .into_iter()
            .find(|c| c.url.ends_with("/file_batches"))
            .unwrap();
        match attach_call.payload {
            Payload::Json(body) => {
                assert_eq!(body["file_ids"], json!(["file_abc"]));
                assert_eq!(body["chunking_strategy"]["type"], "static");
                assert_eq!(
                    body["chunking_strategy"]["static"]["max_chunk_size_tokens"],
                    800
                );
                assert_eq!(
                    body["chunking_strategy"]["static"]["chunk_overlap_tokens"],
                    400
                );
            }
            _ => panic!("attach should be a JSON payload"),
        }
    }

    #[tokio::test]
    async fn attach_failure_surfaces_orphan_and_skips_ledger() {
        let transport = Arc::new(MockTransport::new(|method, url, _| match (method, url) {
            (Method::Post, u) if u.ends_with("/files") => Ok(json!({ "id": "file_abc" })),
            (Method::Get, _) => Ok(json!({ "data": [ { "id": "vs_123", "name": "KB" } ] })),
            (Method::Post, u) if u.ends_with("/file_batches") => {
                Err(RagmateError::Transport {
                    status: 500,
                    body: "ingestion unavailable".into(),
                })
            }
            _ => panic!("unexpected call: {} {url}", method.as_str()),
        }));
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport, ledger.clone());

        let err = manager.upload(txt_upload()).await.unwrap_err();
        match err {
            RagmateError::Consistency {
                stage,
                orphan_file_id,
                ..
            } => {
                assert_eq!(stage, Stage::Attach);
                assert_eq!(orphan_file_id.as_deref(), Some("file_abc"));
            }
            other => panic!("expected consistency error, got {other}"),
        }
        assert!(ledger.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_detaches_then_removes_origin_and_ledger_entry() {
        let transport = happy_transport();
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport.clone(), ledger.clone());

        manager.upload(txt_upload()).await.unwrap();
        let outcome = manager.delete("vs_123", "file_abc").await.unwrap();

        assert!(outcome.detached);
        assert!(outcome.origin_deleted);
        assert!(outcome.removed_from_ledger);
        assert!(ledger.all().unwrap().is_empty());
        assert_eq!(
            transport.count_matching(Method::Delete, "/vector_stores/vs_123/files/file_abc"),
            1
        );
        assert_eq!(transport.count_matching(Method::Delete, "/files/file_abc"), 1);
    }

    #[tokio::test]
    async fn delete_of_absent_file_is_noop_success() {
        let transport = Arc::new(MockTransport::new(|method, _, _| match method {
            Method::Delete => Err(RagmateError::Transport {
                status: 404,
                body: "not found".into(),
            }),
            _ => panic!("only deletes expected"),
        }));
        let manager = manager(transport, Arc::new(MemLedger::new()));

        let outcome = manager.delete("vs_123", "file_gone").await.unwrap();
        assert!(!outcome.detached);
        assert!(!outcome.origin_deleted);
        assert!(!outcome.removed_from_ledger);
    }

    #[tokio::test]
    async fn repeated_delete_reports_success_both_times() {
        let transport = happy_transport();
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport.clone(), ledger.clone());
        manager.upload(txt_upload()).await.unwrap();

        assert!(manager.delete("vs_123", "file_abc").await.is_ok());
        // Second delete: the mock still answers the detach, the ledger entry
        // is already gone. Still a success.
        let second = manager.delete("vs_123", "file_abc").await.unwrap();
        assert!(!second.removed_from_ledger);
    }

    #[tokio::test]
    async fn detach_failure_aborts_and_keeps_ledger() {
        let transport = Arc::new(MockTransport::new(|method, url, _| match (method, url) {
            (Method::Delete, u) if u.contains("/vector_stores/") => {
                Err(RagmateError::Transport {
                    status: 500,
                    body: "store unavailable".into(),
                })
            }
            (Method::Post, u) if u.ends_with("/files") => Ok(json!({ "id": "file_abc" })),
            (Method::Get, _) => Ok(json!({ "data": [ { "id": "vs_123", "name": "KB" } ] })),
            (Method::Post, u) if u.ends_with("/file_batches") => Ok(json!({ "id": "vsfb_1" })),
            _ => panic!("unexpected call: {} {url}", method.as_str()),
        }));
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport.clone(), ledger.clone());
        manager.upload(txt_upload()).await.unwrap();

        let err = manager.delete("vs_123", "file_abc").await.unwrap_err();
        assert!(matches!(
            err,
            RagmateError::Consistency {
                stage: Stage::Detach,
                ..
            }
        ));
        // Conservative: the store still thinks it has the file, keep metadata.
        assert_eq!(ledger.all().unwrap().len(), 1);
        // Origin delete never attempted.
        assert_eq!(transport.count_matching(Method::Delete, "/files/"), 0);
    }

    #[tokio::test]
    async fn origin_delete_failure_is_reported_but_not_fatal() {
        let transport = Arc::new(MockTransport::new(|method, url, _| match (method, url) {
            (Method::Delete, u) if u.contains("/vector_stores/") => Ok(json!({ "deleted": true })),
            (Method::Delete, _) => Err(RagmateError::Transport {
                status: 500,
                body: "file service down".into(),
            }),
            (Method::Post, u) if u.ends_with("/files") => Ok(json!({ "id": "file_abc" })),
            (Method::Get, _) => Ok(json!({ "data": [ { "id": "vs_123", "name": "KB" } ] })),
            (Method::Post, u) if u.ends_with("/file_batches") => Ok(json!({ "id": "vsfb_1" })),
            _ => panic!("unexpected call: {} {url}", method.as_str()),
        }));
        let ledger = Arc::new(MemLedger::new());
        let manager = manager(transport, ledger.clone());
        manager.upload(txt_upload()).await.unwrap();

        let outcome = manager.delete("vs_123", "file_abc").await.unwrap();
        assert!(outcome.detached);
        assert!(!outcome.origin_deleted);
        assert!(outcome.removed_from_ledger);
        assert!(ledger.all().unwrap().is_empty());
    }
}
