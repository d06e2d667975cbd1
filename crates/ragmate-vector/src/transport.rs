//! Authenticated HTTP transport to the vector-search service.
//!
//! Every request carries the bearer key and the API-version marker header.
//! The payload decides the encoding: JSON bodies get an explicit
//! `Content-Type: application/json`, file payloads go out as
//! multipart/form-data with reqwest picking the boundary. A 2xx response is
//! decoded as JSON; anything else becomes `RagmateError::Transport` carrying
//! the status and raw body. Retry policy lives one layer up — this client
//! never re-issues a request on its own.

use async_trait::async_trait;
use ragmate_core::error::{RagmateError, Result};
use serde_json::Value;
use std::time::Duration;

/// API-version marker required by the vector-store endpoints.
const API_VERSION_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Request body. The variant picks the wire encoding.
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Json(Value),
    /// A file upload plus plain form fields (e.g. `purpose=assistants`).
    /// Sent as multipart/form-data.
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
        fields: Vec<(String, String)>,
    },
}

/// The seam between the orchestration layer and the wire.
///
/// Production uses [`HttpTransport`]; tests script a mock against the same
/// contract.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str, payload: Payload) -> Result<Value>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given key and per-request timeout.
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ragmate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RagmateError::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, url: &str, payload: Payload) -> Result<Value> {
        let req = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };

        let req = req
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header(API_VERSION_HEADER.0, API_VERSION_HEADER.1);

        let req = match payload {
            Payload::None => req,
            Payload::Json(body) => req
                .header("Content-Type", "application/json")
                .json(&body),
            Payload::File {
                file_name,
                mime,
                bytes,
                fields,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime)
                    .map_err(|e| RagmateError::Validation(format!("Invalid MIME type: {e}")))?;
                let mut form = reqwest::multipart::Form::new().part("file", part);
                for (key, value) in fields {
                    form = form.text(key, value);
                }
                // reqwest sets the multipart boundary header itself.
                req.multipart(form)
            }
        };

        tracing::debug!("{} {}", method.as_str(), url);
        let resp = req
            .send()
            .await
            .map_err(|e| RagmateError::network(format!("{} {url} failed: {e}", method.as_str())))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| RagmateError::network(format!("Reading response body failed: {e}")))?;

        if (200..300).contains(&status) {
            serde_json::from_str(&body).map_err(|e| RagmateError::Transport {
                status,
                body: format!("Invalid JSON body: {e}"),
            })
        } else {
            tracing::debug!("{} {} -> {status}", method.as_str(), url);
            Err(RagmateError::Transport { status, body })
        }
    }
}
