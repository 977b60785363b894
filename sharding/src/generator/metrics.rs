use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::{
    counter::Counter,
    histogram::{exponential_buckets, Histogram},
};

/// Metrics for the [Actor](super::Actor)
pub struct Metrics {
    /// Number of requests sent
    pub sent: Counter,
    /// Number of requests answered before the next tick
    pub completed: Counter,
    /// Number of requests abandoned without an answer
    pub timeouts: Counter,
    /// Number of acks received after their request was abandoned
    pub late: Counter,
    /// Number of acks of a kind this generator never requests
    pub rejected: Counter,
    /// Round-trip latency of completed requests (seconds)
    pub latency: Histogram,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Self {
            sent: Counter::default(),
            completed: Counter::default(),
            timeouts: Counter::default(),
            late: Counter::default(),
            rejected: Counter::default(),
            // 1ms to ~16s
            latency: Histogram::new(exponential_buckets(0.001, 2.0, 15)),
        };
        context.register("sent", "Number of requests sent", metrics.sent.clone());
        context.register(
            "completed",
            "Number of requests answered before the next tick",
            metrics.completed.clone(),
        );
        context.register(
            "timeouts",
            "Number of requests abandoned without an answer",
            metrics.timeouts.clone(),
        );
        context.register(
            "late",
            "Number of acks received after their request was abandoned",
            metrics.late.clone(),
        );
        context.register(
            "rejected",
            "Number of acks of a kind this generator never requests",
            metrics.rejected.clone(),
        );
        context.register(
            "latency",
            "Round-trip latency of completed requests",
            metrics.latency.clone(),
        );
        metrics
    }
}
