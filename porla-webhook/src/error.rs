//! Typed errors for webhook configuration, rendering and delivery.
//!
//! None of these are fatal to the process. Configuration errors skip one
//! endpoint entry at load time; every other error skips exactly one
//! (endpoint, event) delivery.

use std::{io, time::Duration};

use thiserror::Error;
use tracing::Level;

use crate::pipeline::Stage;

/// A malformed `[[webhooks]]` entry, reported while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Webhook entry {index} is not a table")]
    NotATable { index: usize },

    #[error("Webhook entry {index} has no string 'url'")]
    MissingUrl { index: usize },

    #[error("Invalid delivery configuration: {0}")]
    Delivery(#[from] toml::de::Error),
}

/// The endpoint URL could not be turned into a request target.
#[derive(Debug, Error)]
pub enum UriError {
    #[error("Invalid url: {0}")]
    Invalid(#[from] url::ParseError),

    #[error("Url has no host: {0}")]
    MissingHost(String),

    #[error("Url has no port and scheme has no default: {0}")]
    MissingPort(String),
}

/// The payload template failed to compile or evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to render payload: {message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The engine's diagnostic.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur while resolving an endpoint host.
#[derive(Debug, Error)]
pub enum DnsError {
    /// DNS query failed due to network or resolver issues.
    #[error("DNS lookup failed: {0}")]
    LookupFailed(#[from] hickory_resolver::ResolveError),

    /// The query succeeded but produced no usable address.
    #[error("No addresses found for host: {0}")]
    NoAddresses(String),
}

/// Errors building the TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to load CA certificates from {path}: {source}")]
    CertificateLoad {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid CA certificate: {0}")]
    InvalidCertificate(String),

    #[error("No trusted root certificates available")]
    NoRootCertificates,
}

impl From<tokio_rustls::rustls::Error> for TlsError {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        Self::InvalidCertificate(err.to_string())
    }
}

/// The shared delivery resources could not be built at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to create DNS resolver: {0}")]
    Dns(#[from] DnsError),

    #[error("Failed to configure TLS: {0}")]
    Tls(#[from] TlsError),
}

/// A network failure that aborted one delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Resolve failed: {0}")]
    Resolve(#[from] DnsError),

    #[error("Connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Connection closed before the response was complete")]
    ConnectionClosed,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl DeliveryError {
    /// The pipeline stage this error aborted.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Resolve(_) => Stage::ResolvingDns,
            Self::Connect(_) => Stage::Connecting,
            Self::Handshake(_) => Stage::TlsHandshake,
            Self::Write(_) => Stage::Sending,
            Self::Read(_)
            | Self::ConnectionClosed
            | Self::MalformedResponse(_)
            | Self::ResponseTooLarge { .. } => Stage::Receiving,
            Self::Timeout { stage, .. } => *stage,
        }
    }

    /// How loudly to report this failure.
    ///
    /// Once the request has been written the endpoint has most likely seen
    /// the notification, so read-side failures are informational.
    #[must_use]
    pub const fn severity(&self) -> Level {
        match self.stage() {
            Stage::Receiving | Stage::Done => Level::INFO,
            _ => Level::ERROR,
        }
    }
}
