//! Tower Middleware Stack
//!
//! Request-scoped tracing wrapped around every route.

pub mod tracing;

pub use self::tracing::TracingLayer;
