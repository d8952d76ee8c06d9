//! # REST Layer
//!
//! Everything between the feature services and the shop backend: the
//! transport trait and wire types, the `reqwest` implementation, the
//! canned fixture backend, and the in-flight gate that keeps overlapping
//! mutations off the wire.

pub mod client;
pub mod fixture;
pub mod gate;
pub mod http;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use fixture::FixtureTransport;
pub use gate::{InflightGate, InflightGuard};
pub use http::HttpTransport;
pub use transport::{ApiError, ApiResponse, ErrorEntry, Method, RestTransport, SharedTransport};
