//! Timeout configuration for webhook deliveries.
//!
//! Every pipeline stage runs under its own deadline so that an endpoint that
//! stops answering cannot pin a connection and its buffers forever.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-stage deadlines for a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTimeouts {
    /// Timeout for resolving the endpoint host.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::resolve_secs")]
    pub resolve_secs: u64,

    /// Timeout for establishing the TCP connection, across all candidates.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for the TLS handshake on `https` endpoints.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::handshake_secs")]
    pub handshake_secs: u64,

    /// Timeout for writing the request.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::write_secs")]
    pub write_secs: u64,

    /// Timeout for reading the full response.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::read_secs")]
    pub read_secs: u64,
}

impl DeliveryTimeouts {
    #[must_use]
    pub const fn resolve(&self) -> Duration {
        Duration::from_secs(self.resolve_secs)
    }

    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    #[must_use]
    pub const fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    #[must_use]
    pub const fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Upper bound on how long one delivery can take end to end.
    ///
    /// Saturates at `u64::MAX` seconds.
    #[must_use]
    pub const fn total(&self) -> Duration {
        Duration::from_secs(
            self.resolve_secs
                .saturating_add(self.connect_secs)
                .saturating_add(self.handshake_secs)
                .saturating_add(self.write_secs)
                .saturating_add(self.read_secs),
        )
    }
}

impl Default for DeliveryTimeouts {
    fn default() -> Self {
        Self {
            resolve_secs: defaults::resolve_secs(),
            connect_secs: defaults::connect_secs(),
            handshake_secs: defaults::handshake_secs(),
            write_secs: defaults::write_secs(),
            read_secs: defaults::read_secs(),
        }
    }
}

mod defaults {
    pub const fn resolve_secs() -> u64 {
        10
    }
    pub const fn connect_secs() -> u64 {
        10
    }
    pub const fn handshake_secs() -> u64 {
        10
    }
    pub const fn write_secs() -> u64 {
        30
    }
    pub const fn read_secs() -> u64 {
        30
    }
}
