//! # API Client
//!
//! What the feature services actually hold: the transport plus the
//! in-flight gate, as one factory-registered component. Reads pass
//! straight through; mutations claim their resource through
//! [`ApiClient::guarded`] first, so a double-clicked button turns into
//! [`ApiError::Busy`] instead of a second request racing the first.

use serde_json::Value;

use super::gate::{InflightGate, InflightGuard};
use super::transport::{ApiError, ApiResponse, Method, SharedTransport};

pub struct ApiClient {
    transport: SharedTransport,
    gate: InflightGate,
}

impl ApiClient {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            gate: InflightGate::new(),
        }
    }

    pub fn gate(&self) -> &InflightGate {
        &self.gate
    }

    /// Claim `resource` for the duration of a mutation. The guard must be
    /// held across the request's await.
    pub fn guarded(&self, resource: &str) -> Result<InflightGuard, ApiError> {
        self.gate.try_acquire(resource)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.transport.request(Method::Get, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.transport.request(Method::Post, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.transport.request(Method::Put, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.transport.request(Method::Delete, path, None).await
    }
}
