//! In-memory resolver so tests never touch real DNS
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use async_trait::async_trait;
use porla_webhook::{DnsError, Resolve};

/// Resolves a fixed set of host names; anything else fails like NXDOMAIN
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `host` to loopback
    #[must_use]
    pub fn with_local_host(self, host: &str) -> Self {
        self.with_host(host, IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[must_use]
    pub fn with_host(mut self, host: &str, ip: IpAddr) -> Self {
        self.hosts.insert(host.to_string(), ip);
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        self.hosts
            .get(host)
            .map(|ip| vec![SocketAddr::new(*ip, port)])
            .ok_or_else(|| DnsError::NoAddresses(host.to_string()))
    }
}
