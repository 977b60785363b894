//! Exercise the registry with a steady stream of requests.
//!
//! # Overview
//!
//! A generator [Actor] ticks at a fixed interval (the first tick fires immediately). On each
//! tick it either issues a new request, chosen by its [workload::Workload], or, if the previous
//! request is still unanswered, abandons it and logs "No response". The next request goes out
//! on the following tick, so a generator never has more than one request in flight and recovers
//! from lost replies without retrying.
//!
//! Acks are correlated with the outstanding request by the timestamp they echo. An ack that
//! arrives after its request was abandoned is logged as late and otherwise ignored.

use std::time::Duration;

mod actor;
pub use actor::Actor;
mod metrics;
pub mod state;
pub mod workload;

/// Configuration for the [Actor].
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the generator, used in logs and in the values of generated commands.
    pub name: String,

    /// Interval between ticks.
    pub tick_interval: Duration,

    /// Capacity of the channel on which acks are received.
    pub mailbox_size: usize,
}
