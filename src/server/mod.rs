//! HTTP server.
//!
//! This module provides:
//! - The discovery event stream (SSE)
//! - REST endpoints for checksums, status, health and metrics
//! - Logging and metrics setup

mod app;
pub mod metrics;
mod observability;
mod rest;
mod state;
mod stream;

pub use app::{App, ServerConfig};
pub use metrics::init_metrics;
pub use observability::{init_tracing, spans};
pub use rest::{create_rest_router, ChecksumRequest, ChecksumResponse, HealthResponse};
pub use state::AppState;
pub use stream::{create_stream_router, StreamQuery};
