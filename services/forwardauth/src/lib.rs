//! Forward-Auth Service - OAuth gatekeeper for reverse proxies.
//!
//! This crate provides the core functionality for the forward-auth service:
//! the access decision engine (signed cookie verification, OAuth code
//! exchange, whitelist enforcement and redirect orchestration) and a
//! Snowflake-style trace-id generator for tagging untraced requests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod decision;
pub mod error;
pub mod forwarded;
pub mod jwt;
pub mod middleware;
pub mod oauth;
pub mod observability;
pub mod query;
pub mod redirect;
pub mod routes;
pub mod shutdown;
pub mod snowflake;

pub use app::{AppState, router};
pub use config::Config;
pub use error::{ErrorCode, ForwardAuthError};
