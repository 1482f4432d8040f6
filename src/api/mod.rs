//! REST API module
//!
//! This module provides the HTTP server and REST API endpoints including:
//! - API routing and request handling
//! - Authentication middleware wiring
//! - Static serving of uploaded cover images
//! - Error handling and response formatting

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use middleware::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
pub use server::ApiServer;
