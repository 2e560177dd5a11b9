//! HTTP server for the deployment webhook
//!
//! Endpoints:
//! - GET /health - Liveness check, no authentication
//! - POST /deploy - Queue a deployment (bearer token required)
//!
//! Every other method or path answers 404 `{"error":"Not found"}`.

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod server;

pub use server::start_server;
