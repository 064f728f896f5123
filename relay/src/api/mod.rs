//! HTTP surface of the relay.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response types used for OpenAPI documentation

pub mod handlers;
pub mod models;
