//! Host resolution for webhook endpoints.
//!
//! [`Resolve`] is the seam the pipeline talks to; [`DnsResolver`] is the
//! production implementation backed by hickory's tokio resolver.

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use hickory_resolver::{
    TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DnsError;

/// Resolves an endpoint host to connection candidates.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Returns every address `host` resolves to, paired with `port`, in the
    /// order they should be tried.
    ///
    /// # Errors
    ///
    /// Returns `DnsError` if the lookup fails or yields no addresses.
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError>;
}

/// Configuration for the DNS resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// DNS query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    5
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// DNS resolver using the system configuration.
#[derive(Debug)]
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl DnsResolver {
    /// Creates a new DNS resolver with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new() -> Result<Self, DnsError> {
        Self::with_dns_config(&DnsConfig::default())
    }

    /// Creates a new DNS resolver from the system configuration with custom
    /// options.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn with_dns_config(dns_config: &DnsConfig) -> Result<Self, DnsError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(dns_config.timeout_secs);

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }

    /// Creates a new DNS resolver with explicit name servers.
    #[must_use]
    pub fn with_resolver_config(resolver_config: ResolverConfig, opts: ResolverOpts) -> Self {
        let resolver =
            TokioResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver }
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        debug!("Resolving webhook host {host}");

        let lookup = self.resolver.lookup_ip(host).await?;
        let addresses: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, port)).collect();

        if addresses.is_empty() {
            return Err(DnsError::NoAddresses(host.to_string()));
        }

        debug!("Resolved {host} to {} address(es)", addresses.len());
        Ok(addresses)
    }
}
