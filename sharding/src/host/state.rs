use crate::{
    types::{Entity, EntityId},
    wire::{Ack, Action, Command, CommandAck, Query, QueryAck, QueryAckNotFound, Request},
};
use std::fmt;
use tracing::debug;

/// Lifecycle of a single entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No command has been applied yet.
    Uninitialized,

    /// The entity exists and can be read or updated.
    Active(Entity),

    /// The host has been idle for too long and is shutting down. In-memory state is gone.
    Passivating,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Uninitialized => f.write_str("uninitialized"),
            State::Active(entity) => write!(f, "active({entity})"),
            State::Passivating => f.write_str("passivating"),
        }
    }
}

/// Input to a [Host].
#[derive(Clone, Debug)]
pub enum Event {
    Command(Command),
    Query(Query),
    /// No command or query arrived within the idle window.
    IdleTimeout,
}

impl From<Request> for Event {
    fn from(request: Request) -> Self {
        match request {
            Request::Command(command) => Event::Command(command),
            Request::Query(query) => Event::Query(query),
        }
    }
}

/// Outcome of handling an [Event].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Send this ack to the requester.
    Reply(Ack),

    /// The host released its state and must be detached from routing.
    Passivate,

    /// The request was not applied because the host is passivating. It must be handed to the
    /// next incarnation of the entity.
    Deferred(Request),

    /// Nothing to do.
    Ignored,
}

/// State machine of the host responsible for one [EntityId].
pub struct Host {
    id: EntityId,
    state: State,
}

impl Host {
    /// Create a new (uninitialized) host for `id`.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            state: State::Uninitialized,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_passivating(&self) -> bool {
        matches!(self.state, State::Passivating)
    }

    /// Apply `event` and return what the caller should do about it.
    pub fn handle(&mut self, event: Event) -> Transition {
        let before = self.state.to_string();
        let transition = match event {
            Event::Command(command) => self.command(command),
            Event::Query(query) => self.query(query),
            Event::IdleTimeout => self.idle(),
        };
        debug!(id = %self.id, %before, after = %self.state, "transition");
        transition
    }

    fn command(&mut self, command: Command) -> Transition {
        let Command { issued_at, entity } = command;
        let (action, entity) = match &mut self.state {
            State::Uninitialized => {
                // The host's own id is authoritative, whatever the command carries.
                let created = Entity {
                    id: self.id.clone(),
                    value: entity.value,
                };
                self.state = State::Active(created.clone());
                (Action::Initialize, created)
            }
            State::Active(current) => {
                current.value = entity.value;
                (Action::Update, current.clone())
            }
            State::Passivating => {
                return Transition::Deferred(Request::Command(Command { issued_at, entity }));
            }
        };
        Transition::Reply(Ack::Command(CommandAck {
            command_issued_at: issued_at,
            action,
            entity,
        }))
    }

    fn query(&mut self, query: Query) -> Transition {
        match &self.state {
            State::Uninitialized => Transition::Reply(Ack::NotFound(QueryAckNotFound {
                query_issued_at: query.issued_at,
                id: self.id.clone(),
            })),
            State::Active(entity) => Transition::Reply(Ack::Query(QueryAck {
                query_issued_at: query.issued_at,
                entity: entity.clone(),
            })),
            State::Passivating => Transition::Deferred(Request::Query(query)),
        }
    }

    fn idle(&mut self) -> Transition {
        if self.is_passivating() {
            return Transition::Ignored;
        }
        self.state = State::Passivating;
        Transition::Passivate
    }
}
