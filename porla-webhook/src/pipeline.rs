//! The per-attempt delivery pipeline.
//!
//! One [`Delivery`] is created for every (event, endpoint) pair that matched
//! and rendered. It is moved into its own task and walks the stages
//!
//! ```text
//! Idle -> ResolvingDns -> Connecting -> [TlsHandshake] -> Sending -> Receiving -> Done
//! ```
//!
//! where any stage may end in `Aborted`. Nothing in a `Delivery` is shared
//! with another delivery except read-only configuration behind an `Arc`.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use http::Method;
use porla_common::{
    EventName, config::DeliveryTimeouts, incoming, outgoing, traits::FiniteStateMachine,
};
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info};

use crate::{
    config::{DeliveryConfig, Webhook},
    dns::{DnsResolver, Resolve},
    error::{DeliveryError, SetupError},
    request::WebhookRequest,
    response::{ResponseSummary, read_response},
    tls,
    transport::Transport,
    uri::Uri,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Idle,
    ResolvingDns,
    Connecting,
    TlsHandshake,
    Sending,
    Receiving,
    Done,
    Aborted,
}

impl Stage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::ResolvingDns => "Resolving DNS",
            Self::Connecting => "Connecting",
            Self::TlsHandshake => "TLS handshake",
            Self::Sending => "Sending",
            Self::Receiving => "Receiving",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// The current stage completed.
    Advance,
    /// The current stage failed.
    Fail,
}

/// Per-delivery record of the stages entered, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTrail {
    /// Whether the endpoint needs a TLS handshake.
    pub secure: bool,
    pub visited: Vec<Stage>,
}

impl StageTrail {
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self {
            secure,
            visited: Vec::new(),
        }
    }
}

impl FiniteStateMachine for Stage {
    type Input = StageInput;
    type Context = StageTrail;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        if self.is_terminal() {
            return self;
        }

        let next = match input {
            StageInput::Fail => Self::Aborted,
            StageInput::Advance => match self {
                Self::Idle => Self::ResolvingDns,
                Self::ResolvingDns => Self::Connecting,
                Self::Connecting if context.secure => Self::TlsHandshake,
                Self::Connecting | Self::TlsHandshake => Self::Sending,
                Self::Sending => Self::Receiving,
                Self::Receiving | Self::Done | Self::Aborted => Self::Done,
            },
        };

        context.visited.push(next);
        next
    }
}

/// Read-only resources shared by every delivery.
pub struct DeliveryContext {
    pub resolver: Arc<dyn Resolve>,
    pub connector: TlsConnector,
    pub timeouts: DeliveryTimeouts,
    pub max_response_bytes: usize,
}

impl DeliveryContext {
    /// Build the production context: system DNS and the configured trust
    /// roots.
    ///
    /// # Errors
    ///
    /// Returns `SetupError` if the resolver or the TLS configuration cannot
    /// be created.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, SetupError> {
        Ok(Self {
            resolver: Arc::new(DnsResolver::with_dns_config(&config.dns)?),
            connector: tls::connector(&config.tls)?,
            timeouts: config.timeouts.clone(),
            max_response_bytes: config.max_response_bytes,
        })
    }
}

/// How a delivery ended.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// A complete response was read. The status is reported, not judged.
    Delivered { status: u16, stages: Vec<Stage> },
    /// The pipeline stopped at `stage`; `stages` ends with `Aborted`.
    Aborted {
        stage: Stage,
        error: DeliveryError,
        stages: Vec<Stage>,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// One delivery attempt, exclusively owned by the task running it.
pub struct Delivery {
    webhook: Arc<Webhook>,
    uri: Uri,
    event: EventName,
    method: Method,
    request: Vec<u8>,
    buffer: Vec<u8>,
    context: Arc<DeliveryContext>,
}

async fn within<T, F>(stage: Stage, limit: Duration, operation: F) -> Result<T, DeliveryError>
where
    F: Future<Output = Result<T, DeliveryError>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| DeliveryError::Timeout {
            stage,
            after: limit,
        })?
}

impl Delivery {
    #[must_use]
    pub fn new(
        webhook: Arc<Webhook>,
        uri: Uri,
        event: EventName,
        payload: String,
        context: Arc<DeliveryContext>,
    ) -> Self {
        let request = WebhookRequest::new(&webhook, &uri, payload);

        Self {
            method: request.method.clone(),
            request: request.encode(),
            buffer: Vec::new(),
            webhook,
            uri,
            event,
            context,
        }
    }

    /// Drive the pipeline to a terminal stage.
    ///
    /// Failures are logged here: at `error` while the request may not have
    /// reached the endpoint, at `info` once it has been written.
    pub async fn run(mut self) -> DeliveryOutcome {
        let mut trail = StageTrail::new(self.uri.is_secure());
        let mut stage = Stage::Idle;

        match self.attempt(&mut stage, &mut trail).await {
            Ok(summary) => {
                debug!(
                    "Webhook {} for {} delivered: HTTP {} ({} body bytes)",
                    self.webhook.url, self.event, summary.status, summary.body_len
                );

                DeliveryOutcome::Delivered {
                    status: summary.status,
                    stages: trail.visited,
                }
            }
            Err(err) => {
                let failed = stage;
                let aborted = stage.transition(StageInput::Fail, &mut trail);

                if err.severity() == tracing::Level::INFO {
                    info!(
                        "Webhook {} for {}: {aborted} while {failed}: {err}",
                        self.webhook.url, self.event
                    );
                } else {
                    error!(
                        "Webhook {} for {}: {aborted} while {failed}: {err}",
                        self.webhook.url, self.event
                    );
                }

                DeliveryOutcome::Aborted {
                    stage: failed,
                    error: err,
                    stages: trail.visited,
                }
            }
        }
    }

    async fn attempt(
        &mut self,
        stage: &mut Stage,
        trail: &mut StageTrail,
    ) -> Result<ResponseSummary, DeliveryError> {
        let context = Arc::clone(&self.context);
        let timeouts = &context.timeouts;

        *stage = stage.transition(StageInput::Advance, trail);
        let candidates = within(*stage, timeouts.resolve(), async {
            context
                .resolver
                .resolve(&self.uri.host, self.uri.port)
                .await
                .map_err(DeliveryError::from)
        })
        .await?;

        *stage = stage.transition(StageInput::Advance, trail);
        let mut transport = within(*stage, timeouts.connect(), Transport::connect(&candidates)).await?;

        *stage = stage.transition(StageInput::Advance, trail);
        if *stage == Stage::TlsHandshake {
            transport = within(
                *stage,
                timeouts.handshake(),
                transport.handshake(&context.connector, &self.uri.host),
            )
            .await?;
            *stage = stage.transition(StageInput::Advance, trail);
        }

        outgoing!(
            level = DEBUG,
            "{} {} ({} bytes) to {} for {}",
            self.method,
            self.uri.path,
            self.request.len(),
            self.uri.authority(),
            self.event
        );
        within(*stage, timeouts.write(), transport.write_all(&self.request)).await?;

        *stage = stage.transition(StageInput::Advance, trail);
        let summary = within(
            *stage,
            timeouts.read(),
            read_response(&mut transport, &mut self.buffer, context.max_response_bytes),
        )
        .await?;
        incoming!(
            level = DEBUG,
            "HTTP {} from {}",
            summary.status,
            self.uri.authority()
        );

        *stage = stage.transition(StageInput::Advance, trail);
        Ok(summary)
    }
}
