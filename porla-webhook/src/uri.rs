//! Endpoint URL parsing.

use std::fmt;

use url::{Host, Url};

use crate::error::UriError;

/// The parts of an endpoint URL the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: String,
    /// Host name or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
    /// Request target: path plus query, as written in the URL.
    pub path: String,
}

impl Uri {
    /// Parse an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `UriError` if the URL is malformed, has no host, or has no
    /// explicit port and a scheme without a well-known default.
    pub fn parse(input: &str) -> Result<Self, UriError> {
        let url = Url::parse(input)?;

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(UriError::MissingHost(input.to_string())),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| UriError::MissingPort(input.to_string()))?;

        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            path: if path.is_empty() { "/".to_string() } else { path },
        })
    }

    /// Whether this endpoint is reached over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// The value of the `Host` header: always `host:port`.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path)
    }
}
