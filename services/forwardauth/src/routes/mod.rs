//! HTTP handlers.

pub mod authentication;
pub mod health;
pub mod tracing;

/// Path of the OAuth access check, relative to the route prefix.
pub const AUTHENTICATION_PATH: &str = "/authentication/github";
/// Path of the trace-id endpoint, relative to the route prefix.
pub const SET_TRACE_ID_PATH: &str = "/tracing/settraceid";
