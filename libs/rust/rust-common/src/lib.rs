//! Shared library for cross-cutting concerns in forward-auth Rust services.
//!
//! This crate provides centralized implementations for:
//! - Shared error type
//! - HTTP client configuration and building
//! - Tracing subscriber installation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
