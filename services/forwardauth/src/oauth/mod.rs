//! OAuth authorization-code exchange.

pub mod client;

pub use client::{CodeExchanger, HttpCodeExchanger};
