use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};

/// Metrics for the [Actor](super::Actor)
#[derive(Default)]
pub struct Metrics {
    /// Number of entity hosts tracked by the region (active or passivating)
    pub hosts: Gauge,
    /// Number of entity hosts started
    pub activations: Counter,
    /// Number of entity hosts passivated after going idle
    pub passivations: Counter,
    /// Number of requests buffered while their host was passivating
    pub buffered: Counter,
    /// Number of messages dropped because they could not be routed to an entity
    pub unroutable: Counter,
    /// Number of requests dropped because their shard is owned by another region
    pub misrouted: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Self::default();
        context.register(
            "hosts",
            "Number of entity hosts tracked by the region",
            metrics.hosts.clone(),
        );
        context.register(
            "activations",
            "Number of entity hosts started",
            metrics.activations.clone(),
        );
        context.register(
            "passivations",
            "Number of entity hosts passivated after going idle",
            metrics.passivations.clone(),
        );
        context.register(
            "buffered",
            "Number of requests buffered while their host was passivating",
            metrics.buffered.clone(),
        );
        context.register(
            "unroutable",
            "Number of messages dropped because they could not be routed",
            metrics.unroutable.clone(),
        );
        context.register(
            "misrouted",
            "Number of requests dropped because their shard is owned by another region",
            metrics.misrouted.clone(),
        );
        metrics
    }
}
