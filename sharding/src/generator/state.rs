use crate::{
    types::{EntityId, Timestamp},
    wire::Request,
};
use std::time::Duration;

/// The request a generator is waiting on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outstanding {
    pub issued_at: Timestamp,
    pub target: EntityId,
}

/// Whether a generator may issue a new request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// The next tick issues a request.
    Sending,

    /// A request is in flight. The next tick abandons it.
    Receiving(Outstanding),
}

/// Outcome of [Flight::tick].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// A new request was built and must be sent.
    Issued(Request),

    /// The outstanding request was not answered within one tick and is abandoned.
    TimedOut(Outstanding),
}

/// Outcome of [Flight::ack].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    /// The ack answered the outstanding request.
    Completed {
        outstanding: Outstanding,
        latency: Duration,
    },

    /// The ack does not answer the outstanding request (it timed out or was never sent).
    Late,
}

/// Flow control allowing at most one request in flight.
///
/// There is no retry: a request that times out is simply replaced by a new one on the following
/// tick.
#[derive(Clone, Debug)]
pub struct Flight {
    flow: Flow,
}

impl Default for Flight {
    fn default() -> Self {
        Self::new()
    }
}

impl Flight {
    /// Create a new flight that issues on its first tick.
    pub fn new() -> Self {
        Self {
            flow: Flow::Sending,
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Advance on a periodic tick.
    ///
    /// `issue` is only called (to build the next request) if nothing is in flight.
    pub fn tick(&mut self, issue: impl FnOnce() -> Request) -> Tick {
        match std::mem::replace(&mut self.flow, Flow::Sending) {
            Flow::Sending => {
                let request = issue();
                self.flow = Flow::Receiving(Outstanding {
                    issued_at: request.issued_at(),
                    target: request.id().clone(),
                });
                Tick::Issued(request)
            }
            Flow::Receiving(outstanding) => Tick::TimedOut(outstanding),
        }
    }

    /// Correlate an ack (by the timestamp it echoes) with the outstanding request.
    pub fn ack(&mut self, issued_at: Timestamp, now: Timestamp) -> Receipt {
        match std::mem::replace(&mut self.flow, Flow::Sending) {
            Flow::Receiving(outstanding) if outstanding.issued_at == issued_at => {
                Receipt::Completed {
                    latency: outstanding.issued_at.elapsed(now),
                    outstanding,
                }
            }
            flow => {
                self.flow = flow;
                Receipt::Late
            }
        }
    }
}
