//! Route commands and queries to lazily created, self-passivating entities.
//!
//! # Overview
//!
//! Clients address an entity by its [types::EntityId] without knowing where its state lives.
//! Identifiers are partitioned into a fixed number of shards by a stable hash
//! ([router::shard_of]) and every shard is owned by one [region]. A region drops requests for
//! shards it does not own. It starts an entity's [host] on the first request addressed to it and
//! routes every later request to that same host, so there is at most one live host (and one
//! writer) per identifier.
//!
//! A host that receives no request for `idle_timeout` discards its state and detaches from its
//! region (passivation). The next request for the identifier starts a fresh, uninitialized
//! host. State is kept in memory only.
//!
//! Two [generator]s per node exercise the registry: one sends a command every tick, the other a
//! query. Each has at most one request in flight and abandons it if no reply arrives before the
//! next tick.
//!
//! # Wire Format
//!
//! Every message that may cross a node boundary is a [wire::Envelope] and implements
//! [commonware_codec::Codec]. The [router::Directory] encodes requests before handing them to
//! the region of another node, which decodes them and drops anything malformed or not
//! addressed to an entity.

use thiserror::Error;

pub mod config;
pub mod generator;
pub mod host;
pub mod region;
pub mod router;
pub mod types;
pub mod wire;

#[cfg(test)]
pub mod mocks;

/// Errors that can occur when running the registry.
#[derive(Error, Debug)]
pub enum Error {
    #[error("closed")]
    Closed,
    #[error("request too large")]
    TooLarge,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
