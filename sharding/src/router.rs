//! Deterministic placement of entities onto shards.
//!
//! Placement is a pure function of an [EntityId] and the configured shard count, so independent
//! nodes agree on which shard owns an entity without coordinating. The [Router] trait is the seam
//! between request issuers and whatever hosts entities (a single [crate::region] or a
//! [Directory] spanning the regions of several nodes).

use crate::{
    region,
    types::EntityId,
    wire::{Ack, Envelope, Request},
    Error,
};
use commonware_codec::Encode;
use futures::channel::mpsc;
use std::{fmt, future::Future, num::NonZeroU32};
use tracing::{trace, warn};

/// 64-bit FNV-1a offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// 64-bit FNV-1a prime.
const FNV_PRIME: u64 = 0x100000001b3;

/// Channel on which an entity host delivers the [Ack] for a request.
pub type Responder = mpsc::Sender<Ack>;

/// A coarse-grained routing group of entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shard(u32);

impl Shard {
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash an identifier with 64-bit FNV-1a.
///
/// Unlike [std::collections::hash_map::DefaultHasher], the result is stable across processes
/// and toolchains.
fn hash(id: &EntityId) -> u64 {
    id.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Compute the shard that owns `id`.
///
/// The hash is unsigned, so the result is always in `0..shards`.
pub fn shard_of(id: &EntityId, shards: NonZeroU32) -> Shard {
    Shard((hash(id) % u64::from(shards.get())) as u32)
}

/// Extract the identifier an envelope is addressed to.
///
/// Returns `None` for any envelope that is not routable to an entity host (acks).
pub fn extract_id(envelope: &Envelope) -> Option<&EntityId> {
    match envelope {
        Envelope::Command(command) => Some(&command.entity.id),
        Envelope::Query(query) => Some(&query.id),
        Envelope::Ack(_) => None,
    }
}

/// Deliver requests to the single host responsible for an entity.
pub trait Router: Clone + Send + 'static {
    /// Route `request` to its entity host. The host replies on `responder`.
    ///
    /// Returns [Error::TooLarge] (without forwarding) if the request exceeds the identifier or
    /// value limits and [Error::Closed] if the routing layer has shut down. Delivery itself is
    /// best-effort: a request that is dropped downstream simply never gets an [Ack].
    fn route(
        &mut self,
        request: Request,
        responder: Responder,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Reject requests that could not be decoded on the receiving side.
///
/// Every [Router] calls this before forwarding, so oversized requests fail the same way whether
/// they are routed locally or encoded for another node.
pub(crate) fn check(request: &Request) -> Result<(), Error> {
    if request.is_bounded() {
        return Ok(());
    }
    warn!(
        id_length = request.id().as_str().len(),
        kind = request.kind(),
        "rejecting oversized request"
    );
    Err(Error::TooLarge)
}

/// Static allocation of shards to the regions of every node.
///
/// Shard `s` is owned by region `s % regions`. Requests cross the node boundary encoded, as
/// they would over a network transport.
#[derive(Clone)]
pub struct Directory {
    shards: NonZeroU32,
    regions: Vec<region::Mailbox>,
}

impl Directory {
    /// Create a new directory over `regions` (indexed by node).
    pub fn new(shards: NonZeroU32, regions: Vec<region::Mailbox>) -> Result<Self, Error> {
        if regions.is_empty() {
            return Err(Error::InvalidConfig("directory requires at least one region"));
        }
        Ok(Self { shards, regions })
    }

    /// Index of the region that owns `shard`.
    pub fn owner(&self, shard: Shard) -> usize {
        owner(shard, self.regions.len())
    }
}

/// Index of the region that owns `shard` when there are `regions` regions.
pub fn owner(shard: Shard, regions: usize) -> usize {
    shard.get() as usize % regions
}

impl Router for Directory {
    async fn route(&mut self, request: Request, responder: Responder) -> Result<(), Error> {
        check(&request)?;
        let shard = shard_of(request.id(), self.shards);
        let index = self.owner(shard);
        trace!(id = %request.id(), %shard, region = index, "forwarding");
        let payload = Envelope::from(request).encode();
        let result = self.regions[index].deliver(payload.into(), responder).await;
        if result.is_err() {
            warn!(%shard, region = index, "region closed");
        }
        result
    }
}
