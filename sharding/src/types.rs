//! Entities, their identifiers, and the timestamps used to correlate requests with acks.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Maximum length (in bytes) of an encoded [EntityId].
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length (in bytes) of an encoded [Value].
pub const MAX_VALUE_LENGTH: usize = 1024;

/// Stable, opaque identity of an entity.
///
/// The identifier is used for routing and equality and is never reassigned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the raw bytes of the identifier (used for hashing).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether the identifier fits in [MAX_ID_LENGTH] bytes.
    pub fn is_bounded(&self) -> bool {
        self.0.len() <= MAX_ID_LENGTH
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Write for EntityId {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.as_bytes().to_vec().write(buf);
    }
}

impl EncodeSize for EntityId {
    fn encode_size(&self) -> usize {
        self.0.as_bytes().to_vec().encode_size()
    }
}

impl Read for EntityId {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        let bytes = Vec::<u8>::read_range(buf, ..=MAX_ID_LENGTH)?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|_| Error::Invalid("EntityId", "invalid utf-8"))
    }
}

/// Opaque payload held by an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value(String);

impl Value {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the value fits in [MAX_VALUE_LENGTH] bytes.
    pub fn is_bounded(&self) -> bool {
        self.0.len() <= MAX_VALUE_LENGTH
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Write for Value {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.as_bytes().to_vec().write(buf);
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        self.0.as_bytes().to_vec().encode_size()
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        let bytes = Vec::<u8>::read_range(buf, ..=MAX_VALUE_LENGTH)?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|_| Error::Invalid("Value", "invalid utf-8"))
    }
}

/// An addressable unit of mutable state.
///
/// The `value` of an entity is only ever mutated by the host that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub value: Value,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.id, self.value)
    }
}

impl Write for Entity {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.value.write(buf);
    }
}

impl EncodeSize for Entity {
    fn encode_size(&self) -> usize {
        self.id.encode_size() + self.value.encode_size()
    }
}

impl Read for Entity {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        let id = EntityId::read(buf)?;
        let value = Value::read(buf)?;
        Ok(Self { id, value })
    }
}

/// Nanoseconds since the UNIX epoch, as observed by the runtime clock.
///
/// Every request carries the [Timestamp] at which it was issued and every ack
/// echoes it back, so the issuer can compute round-trip latency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Time elapsed between `self` and `now` (zero if `now` is earlier).
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        Duration::from_nanos(now.0.saturating_sub(self.0))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Write for Timestamp {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl EncodeSize for Timestamp {
    fn encode_size(&self) -> usize {
        self.0.encode_size()
    }
}

impl Read for Timestamp {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        u64::read(buf).map(Self)
    }
}
