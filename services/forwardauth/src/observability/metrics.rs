//! Decision and Exchange Metrics
//!
//! Provides Prometheus counters for access outcomes and trace-id generation,
//! and a latency histogram for the outbound code exchange.

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "forwardauth";

/// Service metrics, registered in a private registry.
#[derive(Clone)]
pub struct ForwardAuthMetrics {
    registry: Registry,
    /// Access decisions by outcome
    pub decisions: CounterVec,
    /// Code exchange latency by result
    pub exchange_duration: HistogramVec,
    /// Trace ids minted by the tracing endpoint
    pub trace_ids_generated: IntCounter,
}

impl ForwardAuthMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = CounterVec::new(
            Opts::new("decisions_total", "Total access decisions").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let exchange_duration = HistogramVec::new(
            HistogramOpts::new(
                "exchange_duration_seconds",
                "Authorization code exchange latency in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["result"],
        )?;
        registry.register(Box::new(exchange_duration.clone()))?;

        let trace_ids_generated = IntCounter::with_opts(
            Opts::new("trace_ids_generated_total", "Total trace ids generated")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(trace_ids_generated.clone()))?;

        Ok(Self {
            registry,
            decisions,
            exchange_duration,
            trace_ids_generated,
        })
    }

    /// Records one access decision
    pub fn record_decision(&self, outcome: &str) {
        self.decisions.with_label_values(&[outcome]).inc();
    }

    /// Records one code exchange
    pub fn record_exchange(&self, result: &str, latency_secs: f64) {
        self.exchange_duration
            .with_label_values(&[result])
            .observe(latency_secs);
    }

    /// Records one generated trace id
    pub fn record_trace_id(&self) {
        self.trace_ids_generated.inc();
    }

    /// Renders the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ForwardAuthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardAuthMetrics").finish_non_exhaustive()
    }
}
