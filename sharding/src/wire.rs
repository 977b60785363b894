//! Messages exchanged between request issuers and entity hosts.

use crate::types::{Entity, EntityId, Timestamp};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use std::fmt;

/// Request to create (if absent) or update an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub issued_at: Timestamp,
    pub entity: Entity,
}

impl Command {
    pub fn new(issued_at: Timestamp, entity: Entity) -> Self {
        Self { issued_at, entity }
    }
}

/// Request to read the current state of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub issued_at: Timestamp,
    pub id: EntityId,
}

impl Query {
    pub fn new(issued_at: Timestamp, id: EntityId) -> Self {
        Self { issued_at, id }
    }
}

/// Transition applied by a [Command].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// The entity did not exist and was created.
    Initialize,
    /// The value of an existing entity was overwritten.
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Initialize => f.write_str("initialize"),
            Action::Update => f.write_str("update"),
        }
    }
}

/// Reply to a [Command].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandAck {
    /// The `issued_at` of the [Command] being acknowledged.
    pub command_issued_at: Timestamp,
    pub action: Action,
    /// The entity after the command was applied.
    pub entity: Entity,
}

/// Reply to a [Query] for an entity that exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryAck {
    /// The `issued_at` of the [Query] being acknowledged.
    pub query_issued_at: Timestamp,
    pub entity: Entity,
}

/// Reply to a [Query] for an entity that has not been initialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryAckNotFound {
    /// The `issued_at` of the [Query] being acknowledged.
    pub query_issued_at: Timestamp,
    pub id: EntityId,
}

/// Any reply sent by an entity host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Command(CommandAck),
    Query(QueryAck),
    NotFound(QueryAckNotFound),
}

impl Ack {
    /// The timestamp of the request this ack correlates to.
    pub fn issued_at(&self) -> Timestamp {
        match self {
            Ack::Command(ack) => ack.command_issued_at,
            Ack::Query(ack) => ack.query_issued_at,
            Ack::NotFound(ack) => ack.query_issued_at,
        }
    }
}

/// A message that can be addressed to an entity host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Command(Command),
    Query(Query),
}

impl Request {
    pub fn id(&self) -> &EntityId {
        match self {
            Request::Command(command) => &command.entity.id,
            Request::Query(query) => &query.id,
        }
    }

    pub fn issued_at(&self) -> Timestamp {
        match self {
            Request::Command(command) => command.issued_at,
            Request::Query(query) => query.issued_at,
        }
    }

    /// Short name of the request kind (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Command(_) => "command",
            Request::Query(_) => "query",
        }
    }

    /// Whether the request fits the limits enforced when decoding an [Envelope].
    pub fn is_bounded(&self) -> bool {
        match self {
            Request::Command(command) => {
                command.entity.id.is_bounded() && command.entity.value.is_bounded()
            }
            Request::Query(query) => query.id.is_bounded(),
        }
    }
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        match request {
            Request::Command(command) => Envelope::Command(command),
            Request::Query(query) => Envelope::Query(query),
        }
    }
}

/// Every message kind that may travel between nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Envelope {
    Command(Command),
    Query(Query),
    Ack(Ack),
}

impl Envelope {
    /// Convert into a [Request], if this envelope is addressed to an entity host.
    pub fn into_request(self) -> Option<Request> {
        match self {
            Envelope::Command(command) => Some(Request::Command(command)),
            Envelope::Query(query) => Some(Request::Query(query)),
            Envelope::Ack(_) => None,
        }
    }

    /// Short name of the envelope kind (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Command(_) => "command",
            Envelope::Query(_) => "query",
            Envelope::Ack(Ack::Command(_)) => "command_ack",
            Envelope::Ack(Ack::Query(_)) => "query_ack",
            Envelope::Ack(Ack::NotFound(_)) => "query_ack_not_found",
        }
    }
}

const COMMAND: u8 = 0;
const QUERY: u8 = 1;
const COMMAND_ACK: u8 = 2;
const QUERY_ACK: u8 = 3;
const QUERY_ACK_NOT_FOUND: u8 = 4;

const INITIALIZE: u8 = 0;
const UPDATE: u8 = 1;

impl Write for Action {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Action::Initialize => buf.put_u8(INITIALIZE),
            Action::Update => buf.put_u8(UPDATE),
        }
    }
}

impl EncodeSize for Action {
    fn encode_size(&self) -> usize {
        1
    }
}

impl Read for Action {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        match u8::read(buf)? {
            INITIALIZE => Ok(Action::Initialize),
            UPDATE => Ok(Action::Update),
            _ => Err(Error::Invalid("Action", "invalid action")),
        }
    }
}

impl Write for Envelope {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Envelope::Command(command) => {
                buf.put_u8(COMMAND);
                command.issued_at.write(buf);
                command.entity.write(buf);
            }
            Envelope::Query(query) => {
                buf.put_u8(QUERY);
                query.issued_at.write(buf);
                query.id.write(buf);
            }
            Envelope::Ack(Ack::Command(ack)) => {
                buf.put_u8(COMMAND_ACK);
                ack.command_issued_at.write(buf);
                ack.action.write(buf);
                ack.entity.write(buf);
            }
            Envelope::Ack(Ack::Query(ack)) => {
                buf.put_u8(QUERY_ACK);
                ack.query_issued_at.write(buf);
                ack.entity.write(buf);
            }
            Envelope::Ack(Ack::NotFound(ack)) => {
                buf.put_u8(QUERY_ACK_NOT_FOUND);
                ack.query_issued_at.write(buf);
                ack.id.write(buf);
            }
        }
    }
}

impl EncodeSize for Envelope {
    fn encode_size(&self) -> usize {
        1 + match self {
            Envelope::Command(command) => {
                command.issued_at.encode_size() + command.entity.encode_size()
            }
            Envelope::Query(query) => query.issued_at.encode_size() + query.id.encode_size(),
            Envelope::Ack(Ack::Command(ack)) => {
                ack.command_issued_at.encode_size()
                    + ack.action.encode_size()
                    + ack.entity.encode_size()
            }
            Envelope::Ack(Ack::Query(ack)) => {
                ack.query_issued_at.encode_size() + ack.entity.encode_size()
            }
            Envelope::Ack(Ack::NotFound(ack)) => {
                ack.query_issued_at.encode_size() + ack.id.encode_size()
            }
        }
    }
}

impl Read for Envelope {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        let kind = u8::read(buf)?;
        let envelope = match kind {
            COMMAND => Envelope::Command(Command {
                issued_at: Timestamp::read(buf)?,
                entity: Entity::read(buf)?,
            }),
            QUERY => Envelope::Query(Query {
                issued_at: Timestamp::read(buf)?,
                id: EntityId::read(buf)?,
            }),
            COMMAND_ACK => Envelope::Ack(Ack::Command(CommandAck {
                command_issued_at: Timestamp::read(buf)?,
                action: Action::read(buf)?,
                entity: Entity::read(buf)?,
            })),
            QUERY_ACK => Envelope::Ack(Ack::Query(QueryAck {
                query_issued_at: Timestamp::read(buf)?,
                entity: Entity::read(buf)?,
            })),
            QUERY_ACK_NOT_FOUND => Envelope::Ack(Ack::NotFound(QueryAckNotFound {
                query_issued_at: Timestamp::read(buf)?,
                id: EntityId::read(buf)?,
            })),
            _ => return Err(Error::Invalid("Envelope", "invalid kind")),
        };
        Ok(envelope)
    }
}
