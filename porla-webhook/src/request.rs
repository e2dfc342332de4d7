//! HTTP/1.1 request construction for a single delivery.
//!
//! Header precedence: user headers are applied first, in configuration
//! order, then the managed headers (`Content-Type`, `Host`, `User-Agent` and
//! the body framing) are set and replace anything the user supplied under
//! the same name.

use http::{
    HeaderMap, HeaderName, HeaderValue, Method,
    header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING, USER_AGENT as USER_AGENT_HEADER},
};
use tracing::{debug, warn};

use crate::{config::Webhook, uri::Uri};

/// Sent as `User-Agent` on every webhook call.
pub const USER_AGENT: &str = "porla/1.0";

/// Headers porla always sets itself.
fn is_managed(header: &HeaderName) -> bool {
    [CONTENT_TYPE, HOST, USER_AGENT_HEADER, CONTENT_LENGTH, TRANSFER_ENCODING].contains(header)
}

/// A fully prepared webhook request.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl WebhookRequest {
    /// Build the request for `webhook` with an already rendered `payload`.
    ///
    /// An empty payload makes a bodiless `GET`; anything else is a `POST`
    /// with a matching `Content-Length`.
    #[must_use]
    pub fn new(webhook: &Webhook, uri: &Uri, payload: String) -> Self {
        let method = if payload.is_empty() {
            Method::GET
        } else {
            Method::POST
        };

        let mut headers = HeaderMap::new();

        for (name, value) in &webhook.headers {
            let (Ok(header), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                warn!("Webhook {}: skipping invalid header '{name}'", webhook.url);
                continue;
            };

            if is_managed(&header) {
                debug!("Webhook {}: header '{name}' is managed by porla and cannot be overridden", webhook.url);
                continue;
            }

            headers.insert(header, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&uri.authority()) {
            Ok(host) => {
                headers.insert(HOST, host);
            }
            Err(e) => warn!("Webhook {}: cannot use '{}' as Host: {e}", webhook.url, uri.authority()),
        }
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));

        if !payload.is_empty() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(payload.len()));
        }

        Self {
            method,
            target: uri.path.clone(),
            headers,
            body: payload,
        }
    }

    /// Serialise to HTTP/1.1 wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());

        out.extend_from_slice(self.method.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(b" HTTP/1.1\r\n");

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}
