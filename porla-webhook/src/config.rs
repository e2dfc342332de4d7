//! Webhook endpoint configuration.
//!
//! Endpoints are loaded from the `[[webhooks]]` array of the config file:
//!
//! ```toml
//! [[webhooks]]
//! url = "https://hooks.example.com/porla"
//! on = ["torrent_added", "torrent_finished"]
//! headers = [{ Authorization = "Bearer secret" }]
//! payload = '{"event": {{ event_name|tojson }}}'
//! ```
//!
//! Loading is lenient: a malformed entry is skipped with a warning and the
//! remaining entries still load.

use std::{collections::BTreeSet, path::PathBuf};

use porla_common::{EventName, config::DeliveryTimeouts};
use serde::{Deserialize, Serialize};
use toml::Value;
use tracing::warn;

use crate::{dns::DnsConfig, error::ConfigError};

/// An immutable endpoint descriptor, shared read-only by every delivery
/// that targets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Webhook {
    pub url: String,
    /// Event names this endpoint listens for. Empty means it never fires.
    pub on: BTreeSet<String>,
    /// User headers in configuration order.
    pub headers: Vec<(String, String)>,
    /// Body template. Without one the request is a `GET` with no body.
    pub payload: Option<String>,
}

impl Webhook {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on.extend(events.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn payload(mut self, template: impl Into<String>) -> Self {
        self.payload = Some(template.into());
        self
    }

    #[must_use]
    pub fn listens_to(&self, event: EventName) -> bool {
        self.on.contains(event.as_str())
    }
}

/// Parse the `webhooks` array of a config file.
///
/// Anything other than an array yields no endpoints.
#[must_use]
pub fn parse_webhooks(value: &Value) -> Vec<Webhook> {
    let Some(entries) = value.as_array() else {
        warn!("'webhooks' is not an array, no webhooks configured");
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match parse_webhook(index, entry) {
            Ok(webhook) => Some(webhook),
            Err(err) => {
                warn!("Skipping webhook: {err}");
                None
            }
        })
        .collect()
}

fn parse_webhook(index: usize, entry: &Value) -> Result<Webhook, ConfigError> {
    let table = entry.as_table().ok_or(ConfigError::NotATable { index })?;

    let url = table
        .get("url")
        .and_then(Value::as_str)
        .ok_or(ConfigError::MissingUrl { index })?;

    let mut webhook = Webhook::new(url);

    match table.get("on") {
        Some(Value::String(event)) => {
            webhook.on.insert(event.clone());
        }
        Some(Value::Array(events)) => {
            webhook
                .on
                .extend(events.iter().filter_map(Value::as_str).map(str::to_string));
        }
        Some(_) => warn!("Webhook {url}: 'on' should be a string or list of strings"),
        None => {}
    }

    for event in &webhook.on {
        if event.parse::<EventName>().is_err() {
            warn!("Webhook {url}: '{event}' is not a known event and will never fire");
        }
    }

    if let Some(headers) = table.get("headers").and_then(Value::as_array) {
        for item in headers {
            let Some(header) = item.as_table() else {
                warn!("Webhook header item is not a TOML table");
                continue;
            };

            if header.len() != 1 {
                warn!("Webhook header item should only have a single value");
                continue;
            }

            for (name, value) in header {
                match value.as_str() {
                    Some(value) => webhook.headers.push((name.clone(), value.to_string())),
                    None => warn!("Webhook header '{name}' does not have a string value"),
                }
            }
        }
    }

    webhook.payload = table
        .get("payload")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(webhook)
}

/// Trust settings for `https` endpoints. Peer verification is always on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Load the operating system's trust roots.
    #[serde(default = "default_native_roots")]
    pub native_roots: bool,

    /// Extra PEM bundle of trusted certificates, e.g. a private CA.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

const fn default_native_roots() -> bool {
    true
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            native_roots: default_native_roots(),
            ca_file: None,
        }
    }
}

/// Tunables for the delivery pipeline, the `[delivery]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum number of deliveries on the wire at once; `0` is unbounded.
    ///
    /// Default: 64
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Largest response (head and body) read before giving up.
    ///
    /// Default: 1 MiB
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    #[serde(default)]
    pub timeouts: DeliveryTimeouts,

    #[serde(default)]
    pub tls: TlsSettings,

    #[serde(default)]
    pub dns: DnsConfig,
}

const fn default_max_in_flight() -> usize {
    64
}

const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_response_bytes: default_max_response_bytes(),
            timeouts: DeliveryTimeouts::default(),
            tls: TlsSettings::default(),
            dns: DnsConfig::default(),
        }
    }
}

impl DeliveryConfig {
    /// Read the `[delivery]` table; a missing table gives the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Delivery` if the table has the wrong shape.
    pub fn from_toml(value: Option<&Value>) -> Result<Self, ConfigError> {
        match value {
            Some(value) => Ok(value.clone().try_into()?),
            None => Ok(Self::default()),
        }
    }
}
