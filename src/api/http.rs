//! # HTTP Transport
//!
//! `reqwest`-backed [`RestTransport`] against a real shop backend. JSON
//! in, JSON out; non-success responses are mined for the backend's error
//! stack (`{"error": {"error_stack": [{code, message, ...}]}}`) so the
//! services can react to application codes instead of status numbers.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use super::transport::{ApiError, ApiResponse, ErrorEntry, Method, RestTransport};

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ============================================================================
// Error body mining
// ============================================================================

fn error_stack(payload: &Value) -> Vec<ErrorEntry> {
    payload
        .get("error")
        .and_then(|e| e.get("error_stack"))
        .and_then(Value::as_array)
        .map(|stack| {
            stack
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_body(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    // Cut on a char boundary so multi-byte bodies cannot panic the slice.
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

// ============================================================================
// Transport impl
// ============================================================================

#[async_trait(?Send)]
impl RestTransport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");

        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let success = (200..300).contains(&status);
        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) if success => return Err(ApiError::Payload(err.to_string())),
                // Error responses are allowed to be non-JSON (proxies,
                // crash pages); we synthesize an entry from the body.
                Err(_) => Value::Null,
            }
        };

        if !success {
            let mut messages = error_stack(&payload);
            if messages.is_empty() {
                messages.push(ErrorEntry {
                    code: 0,
                    message: truncate_body(&text),
                    detail: Value::Null,
                });
            }
            warn!("backend error {status} on {method} {path}");
            return Err(ApiError::Api { status, messages });
        }

        let (data, events) = match payload {
            Value::Object(ref map) if map.contains_key("data") => (
                map.get("data").cloned().unwrap_or(Value::Null),
                map.get("events").cloned().unwrap_or(Value::Null),
            ),
            other => (other, Value::Null),
        };
        Ok(ApiResponse { data, events })
    }
}
