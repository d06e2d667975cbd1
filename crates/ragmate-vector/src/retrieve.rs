//! Scored similarity retrieval against a vector store.
//!
//! The query text goes to the service verbatim (`rewrite_query: false` — no
//! server-side query expansion). Each hit is shaped into a
//! [`SearchResult`]: missing scores collapse to 0, missing attributes to an
//! empty map, and the content is the first text chunk or empty. Score
//! filtering is a caller-controlled knob on the [`Query`], on by default.

use crate::retry::RetryPolicy;
use crate::transport::{Method, Payload, Transport};
use ragmate_core::error::Result;
use ragmate_core::types::{Query, SearchResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Retriever {
    transport: Arc<dyn Transport>,
    api_base: String,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(transport: Arc<dyn Transport>, api_base: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            retry,
        }
    }

    /// Run a similarity search and shape the hits.
    pub async fn retrieve(&self, store_id: &str, query: &Query) -> Result<Vec<SearchResult>> {
        let url = format!("{}/vector_stores/{store_id}/search", self.api_base);
        let body = json!({
            "query": query.text,
            "max_num_results": query.max_results,
            "rewrite_query": false,
        });

        // Search has no side effects, so it is safe to retry.
        let response = self
            .retry
            .run("vector search", || {
                self.transport
                    .request(Method::Post, &url, Payload::Json(body.clone()))
            })
            .await?;

        let hits = response["data"].as_array().cloned().unwrap_or_default();
        let mut results: Vec<SearchResult> = hits.iter().map(shape_hit).collect();

        if query.apply_threshold {
            let before = results.len();
            results.retain(|r| r.score >= query.score_threshold);
            tracing::debug!(
                "Search '{}': {} hits, {} above threshold {}",
                query.text,
                before,
                results.len(),
                query.score_threshold
            );
        }
        Ok(results)
    }
}

fn shape_hit(hit: &Value) -> SearchResult {
    let attributes: BTreeMap<String, Value> = hit["attributes"]
        .as_object()
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let content = hit["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    SearchResult {
        content,
        score: hit["score"].as_f64().unwrap_or(0.0),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn scored_hits() -> Value {
        json!({
            "data": [
                {
                    "score": 0.9,
                    "attributes": { "filename": "manual.txt" },
                    "content": [ { "type": "text", "text": "Warranty covers two years." } ]
                },
                {
                    "score": 0.6,
                    "content": [ { "type": "text", "text": "Shipping takes a week." } ]
                },
                {
                    "score": 0.3,
                    "content": [ { "type": "text", "text": "Unrelated chunk." } ]
                }
            ]
        })
    }

    fn retriever(transport: Arc<MockTransport>) -> Retriever {
        Retriever::new(transport, "https://api.test/v1", RetryPolicy::none())
    }

    #[tokio::test]
    async fn threshold_keeps_only_high_scores() {
        let transport = Arc::new(MockTransport::new(|_, _, _| Ok(scored_hits())));
        let results = retriever(transport)
            .retrieve("vs_123", &Query::new("warranty"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.9).abs() < f64::EPSILON);
        assert_eq!(results[0].content, "Warranty covers two years.");
    }

    #[tokio::test]
    async fn unfiltered_returns_every_hit() {
        let transport = Arc::new(MockTransport::new(|_, _, _| Ok(scored_hits())));
        let results = retriever(transport)
            .retrieve("vs_123", &Query::new("warranty").unfiltered())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn query_goes_out_verbatim() {
        let transport = Arc::new(MockTransport::new(|_, _, _| Ok(json!({ "data": [] }))));
        retriever(transport.clone())
            .retrieve("vs_123", &Query::new("what is the warranty?").with_max_results(7))
            .await
            .unwrap();

        let call = &transport.calls()[0];
        assert!(call.url.ends_with("/vector_stores/vs_123/search"));
        match &call.payload {
            Payload::Json(body) => {
                assert_eq!(body["query"], "what is the warranty?");
                assert_eq!(body["max_num_results"], 7);
                assert_eq!(body["rewrite_query"], false);
            }
            _ => panic!("search should be a JSON payload"),
        }
    }

    #[tokio::test]
    async fn shapes_sparse_hits_with_defaults() {
        let transport = Arc::new(MockTransport::new(|_, _, _| {
            Ok(json!({ "data": [ { } ] }))
        }));
        let results = retriever(transport)
            .retrieve("vs_123", &Query::new("q").unfiltered())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
        assert!(results[0].content.is_empty());
        assert!(results[0].attributes.is_empty());
    }

    #[tokio::test]
    async fn scores_stay_within_unit_interval() {
        let transport = Arc::new(MockTransport::new(|_, _, _| Ok(scored_hits())));
        let results = retriever(transport)
            .retrieve("vs_123", &Query::new("warranty").unfiltered())
            .await
            .unwrap();
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }
}
