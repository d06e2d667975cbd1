//! Scripted transport for tests.
//!
//! A handler closure decides the response per call; every call is recorded
//! so tests can assert on the wire traffic (or its absence).

use crate::transport::{Method, Payload, Transport};
use async_trait::async_trait;
use ragmate_core::error::Result;
use serde_json::Value;
use std::sync::Mutex;

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub payload: Payload,
}

type Handler = dyn Fn(Method, &str, &Payload) -> Result<Value> + Send + Sync;

pub struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Method, &str, &Payload) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Everything that went over the wire, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of recorded calls matching a method and URL substring.
    pub fn count_matching(&self, method: Method, url_part: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.url.contains(url_part))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: Method, url: &str, payload: Payload) -> Result<Value> {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            payload: payload.clone(),
        });
        (self.handler)(method, url, &payload)
    }
}
