//! # REST Transport
//!
//! The seam between the feature services and the shop backend. Services
//! talk to a `dyn RestTransport`; the live implementation wraps `reqwest`
//! ([`super::http::HttpTransport`]), and [`super::fixture::FixtureTransport`]
//! plays backend for tests and the demo shell.
//!
//! The trait is `?Send` on purpose: the whole page runtime lives on one
//! local task, so transports may hold `Rc` state.

use std::rc::Rc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One entry of the backend's error stack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub code: u32,
    pub message: String,
    /// Structured context for the error (e.g. the order parameter
    /// definitions a rejected add-to-basket is missing).
    #[serde(default)]
    pub detail: Value,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// The backend answered with a non-success status and (usually) an
    /// error stack.
    #[error("backend rejected the request (status {status}): {messages:?}")]
    Api { status: u16, messages: Vec<ErrorEntry> },
    #[error("network error: {0}")]
    Network(String),
    #[error("payload error: {0}")]
    Payload(String),
    /// A mutation for the same resource is still in flight.
    #[error("{resource:?} already has a mutation in flight")]
    Busy { resource: String },
}

impl ApiError {
    /// First error-stack entry with the given application code, if any.
    pub fn entry_with_code(&self, code: u32) -> Option<&ErrorEntry> {
        match self {
            ApiError::Api { messages, .. } => messages.iter().find(|m| m.code == code),
            _ => None,
        }
    }
}

/// Response envelope: the payload plus a bag of server-pushed events.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub data: Value,
    pub events: Value,
}

impl ApiResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            events: Value::Null,
        }
    }

    /// Deserialize the payload into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.data.clone()).map_err(|e| ApiError::Payload(e.to_string()))
    }
}

#[async_trait(?Send)]
pub trait RestTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError>;

    async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::Put, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::Delete, path, None).await
    }
}

/// How services hold the transport: shared, dynamically dispatched,
/// single-threaded.
pub type SharedTransport = Rc<dyn RestTransport>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_parse_typed() {
        let response = ApiResponse::new(json!({"order_id": 5001}));
        #[derive(Deserialize)]
        struct Placed {
            order_id: u64,
        }
        let placed: Placed = response.parse().unwrap();
        assert_eq!(placed.order_id, 5001);
    }

    #[test]
    fn test_response_parse_reports_payload_error() {
        let response = ApiResponse::new(json!("not an object"));
        let err = response.parse::<super::super::types::CheckoutDoc>().unwrap_err();
        assert!(matches!(err, ApiError::Payload(_)));
    }

    #[test]
    fn test_entry_with_code() {
        let err = ApiError::Api {
            status: 422,
            messages: vec![
                ErrorEntry {
                    code: 100,
                    message: "order parameters required".to_string(),
                    detail: json!([{"id": 9, "name": "color"}]),
                },
                ErrorEntry {
                    code: 7,
                    message: "other".to_string(),
                    detail: Value::Null,
                },
            ],
        };
        assert!(err.entry_with_code(100).is_some());
        assert!(err.entry_with_code(999).is_none());
        assert!(ApiError::Network("x".into()).entry_with_code(100).is_none());
    }
}
