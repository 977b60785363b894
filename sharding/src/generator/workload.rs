use crate::{
    types::{Entity, EntityId, Timestamp, Value},
    wire::{Ack, Command, Query, Request},
};
use rand::Rng;
use std::num::NonZeroU32;

/// Decides what a generator sends.
pub trait Workload: Send + 'static {
    /// Short name of the workload (for logging).
    fn kind(&self) -> &'static str;

    /// Build the next request, issued at `issued_at`.
    fn next(&mut self, rng: &mut impl Rng, issued_at: Timestamp) -> Request;

    /// Whether `ack` is a reply this workload can receive.
    fn accepts(&self, ack: &Ack) -> bool;
}

/// Pick an identifier uniformly from `1..=entities`.
fn random_id(rng: &mut impl Rng, entities: NonZeroU32) -> EntityId {
    EntityId::new(rng.gen_range(1..=entities.get()).to_string())
}

/// Create or update random entities.
///
/// Values are `"{name}-{n}"` where `n` counts the commands issued so far, starting at 1.
pub struct Commands {
    name: String,
    entities: NonZeroU32,
    issued: u64,
}

impl Commands {
    pub fn new(name: impl Into<String>, entities: NonZeroU32) -> Self {
        Self {
            name: name.into(),
            entities,
            issued: 0,
        }
    }
}

impl Workload for Commands {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn next(&mut self, rng: &mut impl Rng, issued_at: Timestamp) -> Request {
        self.issued += 1;
        let id = random_id(rng, self.entities);
        let value = Value::new(format!("{}-{}", self.name, self.issued));
        Request::Command(Command::new(issued_at, Entity { id, value }))
    }

    fn accepts(&self, ack: &Ack) -> bool {
        matches!(ack, Ack::Command(_))
    }
}

/// Read random entities.
pub struct Queries {
    entities: NonZeroU32,
}

impl Queries {
    pub fn new(entities: NonZeroU32) -> Self {
        Self { entities }
    }
}

impl Workload for Queries {
    fn kind(&self) -> &'static str {
        "query"
    }

    fn next(&mut self, rng: &mut impl Rng, issued_at: Timestamp) -> Request {
        Request::Query(Query::new(issued_at, random_id(rng, self.entities)))
    }

    fn accepts(&self, ack: &Ack) -> bool {
        matches!(ack, Ack::Query(_) | Ack::NotFound(_))
    }
}
