//! Webhook notifications for torrent lifecycle events
//!
//! This crate provides:
//! - Endpoint configuration parsing ([`parse_webhooks`], [`DeliveryConfig`])
//! - Payload rendering through a pluggable [`PayloadRenderer`]
//! - The per-attempt delivery pipeline: DNS, connect, TLS, send, receive
//! - The [`Dispatcher`] that fans each event out to subscribed endpoints
//!
//! Delivery is fire-and-forget: there are no retries and no outcome is
//! reported back to the component that raised the event.

mod config;
mod dispatcher;
mod dns;
mod error;
mod pipeline;
mod render;
mod request;
mod response;
mod tls;
mod transport;
mod uri;

pub use config::{DeliveryConfig, TlsSettings, Webhook, parse_webhooks};
pub use dispatcher::Dispatcher;
pub use dns::{DnsConfig, DnsResolver, Resolve};
pub use error::{ConfigError, DeliveryError, DnsError, RenderError, SetupError, TlsError, UriError};
pub use pipeline::{Delivery, DeliveryContext, DeliveryOutcome, Stage, StageInput, StageTrail};
pub use render::{PayloadRenderer, TemplateRenderer};
pub use request::{USER_AGENT, WebhookRequest};
pub use response::{ResponseSummary, read_response};
pub use tls::connector as tls_connector;
pub use transport::Transport;
pub use uri::Uri;
