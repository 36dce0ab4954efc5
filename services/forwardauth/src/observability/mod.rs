//! Prometheus metrics for the forward-auth service.

pub mod metrics;

pub use metrics::ForwardAuthMetrics;
