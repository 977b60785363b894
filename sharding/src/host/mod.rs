//! Host the state of a single entity.
//!
//! # Overview
//!
//! Each entity is owned by exactly one [Actor] at a time. The actor applies commands and
//! queries sequentially through the [state::Host] state machine and replies to the requester
//! without ever blocking on it.
//!
//! # Passivation
//!
//! When no request arrives within `idle_timeout`, the host discards its state and sends
//! [Signal::Passivate] to its region. The region stops routing to the host and drops its end of
//! the mailbox. Until that happens, the host keeps draining its mailbox without applying
//! anything. Once the mailbox ends, the host returns every request it collected in
//! [Signal::Stopped] and exits, so that the region can hand them to the next incarnation.

use std::time::Duration;

mod actor;
pub use actor::Actor;
mod ingress;
pub use ingress::{Mailbox, Message, Signal};
pub mod state;

/// Configuration for the [Actor].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How long a host may go without a command or query before it passivates.
    pub idle_timeout: Duration,

    /// The maximum size of the mailbox backlog.
    pub mailbox_size: usize,
}
