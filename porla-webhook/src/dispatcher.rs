//! Fans lifecycle events out to subscribed webhook endpoints.

use std::sync::Arc;

use porla_common::{Event, Signal, internal};
use tokio::{
    sync::{Semaphore, broadcast::Receiver, broadcast::error::RecvError},
    task::JoinHandle,
    time::{Instant, timeout_at},
};
use tracing::{debug, error, warn};

use crate::{
    config::{DeliveryConfig, Webhook},
    error::SetupError,
    pipeline::{Delivery, DeliveryContext, DeliveryOutcome},
    render::{PayloadRenderer, TemplateRenderer},
    uri::Uri,
};

/// Matches events against the configured endpoints and starts one
/// independent delivery per match.
pub struct Dispatcher {
    webhooks: Vec<Arc<Webhook>>,
    renderer: Arc<dyn PayloadRenderer>,
    context: Arc<DeliveryContext>,
    in_flight: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// `max_in_flight` bounds how many deliveries may be on the wire at
    /// once; `0` leaves them unbounded.
    #[must_use]
    pub fn new(
        webhooks: Vec<Webhook>,
        renderer: Arc<dyn PayloadRenderer>,
        context: DeliveryContext,
        max_in_flight: usize,
    ) -> Self {
        Self {
            webhooks: webhooks.into_iter().map(Arc::new).collect(),
            renderer,
            context: Arc::new(context),
            in_flight: (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight))),
        }
    }

    /// Build a dispatcher with the default template engine, the system
    /// resolver and the configured TLS trust roots.
    ///
    /// # Errors
    ///
    /// Returns `SetupError` if the resolver or TLS configuration cannot be
    /// created.
    pub fn from_config(webhooks: Vec<Webhook>, config: &DeliveryConfig) -> Result<Self, SetupError> {
        Ok(Self::new(
            webhooks,
            Arc::new(TemplateRenderer),
            DeliveryContext::from_config(config)?,
            config.max_in_flight,
        ))
    }

    #[must_use]
    pub fn webhooks(&self) -> usize {
        self.webhooks.len()
    }

    /// Start a delivery to every endpoint subscribed to `event`.
    ///
    /// Matching and rendering happen before this returns; all network work
    /// runs in the returned tasks. An endpoint whose payload fails to render
    /// or whose URL does not parse is skipped without affecting the others.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_event(&self, event: &Event) -> Vec<JoinHandle<DeliveryOutcome>> {
        let variables = event.variables();
        let mut started = Vec::new();

        for webhook in self.webhooks.iter().filter(|w| w.listens_to(event.name)) {
            let payload = match &webhook.payload {
                Some(template) => match self.renderer.render(template, &variables) {
                    Ok(payload) => payload,
                    Err(err) => {
                        error!("Webhook {} for {}: {err}", webhook.url, event.name);
                        continue;
                    }
                },
                None => String::new(),
            };

            let uri = match Uri::parse(&webhook.url) {
                Ok(uri) => uri,
                Err(err) => {
                    error!("Webhook {} for {}: {err}", webhook.url, event.name);
                    continue;
                }
            };

            let delivery = Delivery::new(
                Arc::clone(webhook),
                uri,
                event.name,
                payload,
                Arc::clone(&self.context),
            );
            let in_flight = self.in_flight.clone();

            started.push(tokio::spawn(async move {
                // Held until the delivery finishes.
                let _permit = match in_flight {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                delivery.run().await
            }));
        }

        debug!("{} started {} webhook delivery(ies)", event.name, started.len());
        started
    }

    /// Consume events until a shutdown signal arrives or the bus closes.
    ///
    /// ## Graceful Shutdown
    ///
    /// Once no further events are accepted, deliveries still in flight are
    /// given until the sum of the stage timeouts to finish. Anything still
    /// running after that is abandoned.
    pub async fn serve(self: Arc<Self>, mut events: Receiver<Event>, mut shutdown: Receiver<Signal>) {
        internal!("Webhook dispatcher starting with {} endpoint(s)", self.webhooks.len());

        let mut in_flight: Vec<JoinHandle<DeliveryOutcome>> = Vec::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            in_flight.retain(|handle| !handle.is_finished());
                            in_flight.extend(self.on_event(&event));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Webhook dispatcher fell behind, {skipped} event(s) were dropped");
                        }
                        Err(RecvError::Closed) => {
                            internal!("Event bus closed");
                            break;
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) => {
                            internal!("Webhook dispatcher received shutdown signal");
                            break;
                        }
                        Err(e) => {
                            error!("Webhook dispatcher shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        self.drain(in_flight).await;
        internal!("Webhook dispatcher stopped");
    }

    async fn drain(&self, in_flight: Vec<JoinHandle<DeliveryOutcome>>) {
        let pending: Vec<_> = in_flight
            .into_iter()
            .filter(|handle| !handle.is_finished())
            .collect();

        if pending.is_empty() {
            return;
        }

        let limit = self.context.timeouts.total();
        internal!("Waiting up to {:?} for {} in-flight delivery(ies)", limit, pending.len());

        // A deadline past what `Instant` can represent means no deadline.
        let Some(deadline) = Instant::now().checked_add(limit) else {
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("In-flight delivery failed during shutdown: {e}");
                }
            }
            internal!("All in-flight deliveries completed");
            return;
        };

        let total = pending.len();
        for (finished, handle) in pending.into_iter().enumerate() {
            if timeout_at(deadline, handle).await.is_err() {
                warn!("Shutdown timeout exceeded, abandoning {} in-flight delivery(ies)", total - finished);
                return;
            }
        }

        internal!("All in-flight deliveries completed");
    }
}
