//! # Configuration
//!
//! Process-wide settings for an [`crate::agent::Agent`]. Configuration is
//! passed in explicitly; nothing is read from global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exchange::AutoAccept;
use crate::{Result, invalid};

/// Connection id recorded on offers created without a connection.
pub const CONNECTIONLESS_ID: &str = "connectionless-offer";

/// Agent configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Auto-accept policy for records without their own override.
    pub auto_accept: AutoAccept,

    /// Number of events retained for slow subscribers.
    pub event_capacity: usize,

    /// Ledger lookup cache policy.
    pub cache: CacheConfig,

    /// Placeholder connection id for connection-less offers.
    pub connectionless_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_accept: AutoAccept::Never,
            event_capacity: crate::event::DEFAULT_CAPACITY,
            cache: CacheConfig::default(),
            connectionless_id: CONNECTIONLESS_ID.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON document. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMessage` error when the document is not valid
    /// configuration JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| invalid!("invalid configuration: {e}"))
    }

    /// Set the default auto-accept policy.
    #[must_use]
    pub fn auto_accept(mut self, auto_accept: AutoAccept) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Set the event buffer size.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the ledger cache policy.
    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the connection-less placeholder id.
    #[must_use]
    pub fn connectionless_id(mut self, id: impl Into<String>) -> Self {
        self.connectionless_id = id.into();
        self
    }
}

/// Ledger lookup cache policy.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds an entry stays fresh.
    pub ttl_secs: u64,

    /// Maximum number of entries; the oldest is evicted first.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 128,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
