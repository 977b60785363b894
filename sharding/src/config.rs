//! Configuration file for the `commonware-sharding` binary.

use crate::{generator, region, Error};
use serde::{Deserialize, Serialize};
use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::Path,
    str::FromStr,
    time::Duration,
};
use tracing::Level;

/// Process configuration, deserialized from YAML.
///
/// Every field is optional and falls back to its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of in-process nodes.
    pub nodes: usize,

    /// Number of shards identifiers are partitioned into.
    pub shards: u32,

    /// Generators draw identifiers from `1..=entities`.
    pub entities: u32,

    /// How long (in milliseconds) a host may be idle before it passivates.
    pub idle_timeout_ms: u64,

    /// Interval (in milliseconds) between generator ticks.
    pub tick_interval_ms: u64,

    /// Capacity of every bounded mailbox.
    pub mailbox_size: usize,

    /// Maximum level of emitted logs (`trace`, `debug`, `info`, `warn` or `error`).
    pub log_level: String,

    /// Whether logs are emitted as JSON.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: 3,
            shards: 100,
            entities: 100,
            idle_timeout_ms: 60_000,
            tick_interval_ms: 2_000,
            mailbox_size: 1024,
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = std::fs::read_to_string(path)?;
        Self::parse(&file)
    }

    /// Parse and validate a YAML configuration.
    pub fn parse(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Ensure the configuration describes a runnable deployment.
    pub fn validate(&self) -> Result<(), Error> {
        if self.nodes == 0 {
            return Err(Error::InvalidConfig("nodes must be greater than zero"));
        }
        if self.shards == 0 {
            return Err(Error::InvalidConfig("shards must be greater than zero"));
        }
        if self.entities == 0 {
            return Err(Error::InvalidConfig("entities must be greater than zero"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(Error::InvalidConfig("idle_timeout_ms must be greater than zero"));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig("tick_interval_ms must be greater than zero"));
        }
        if self.mailbox_size == 0 {
            return Err(Error::InvalidConfig("mailbox_size must be greater than zero"));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, Error> {
        Level::from_str(&self.log_level).map_err(|_| Error::InvalidConfig("unknown log_level"))
    }

    pub fn shards(&self) -> Result<NonZeroU32, Error> {
        NonZeroU32::new(self.shards)
            .ok_or(Error::InvalidConfig("shards must be greater than zero"))
    }

    pub fn entities(&self) -> Result<NonZeroU32, Error> {
        NonZeroU32::new(self.entities)
            .ok_or(Error::InvalidConfig("entities must be greater than zero"))
    }

    pub fn nodes(&self) -> Result<NonZeroUsize, Error> {
        NonZeroUsize::new(self.nodes).ok_or(Error::InvalidConfig("nodes must be greater than zero"))
    }

    /// Configuration for the region of node `index`.
    pub fn region(&self, index: usize) -> Result<region::Config, Error> {
        let regions = self.nodes()?;
        if index >= regions.get() {
            return Err(Error::InvalidConfig("region index out of range"));
        }
        Ok(region::Config {
            shards: self.shards()?,
            index,
            regions,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            mailbox_size: self.mailbox_size,
        })
    }

    /// Configuration for a generator called `name`.
    pub fn generator(&self, name: impl Into<String>) -> generator::Config {
        generator::Config {
            name: name.into(),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            mailbox_size: self.mailbox_size,
        }
    }
}
