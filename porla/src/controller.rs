use std::{
    path::Path,
    sync::{Arc, LazyLock},
};

use porla_common::{EventBus, Signal, internal, tracing};
use porla_webhook::{DeliveryConfig, Dispatcher, Webhook, parse_webhooks};
use tokio::{io::BufReader, sync::broadcast};

use crate::feed;

/// The notifier as loaded from its configuration file.
#[derive(Debug, Default)]
pub struct Porla {
    pub webhooks: Vec<Webhook>,
    pub delivery: DeliveryConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Porla {
    /// Parse a TOML configuration.
    ///
    /// `[[webhooks]]` entries are loaded leniently; a malformed `[delivery]`
    /// table is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` is not valid TOML or the `[delivery]`
    /// table has the wrong shape.
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml::from_str(source)?;

        let webhooks = table.get("webhooks").map(parse_webhooks).unwrap_or_default();
        let delivery = DeliveryConfig::from_toml(table.get("delivery"))?;

        Ok(Self { webhooks, delivery })
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config from {}: {e}", path.display()))?;

        Self::from_toml(&source)
    }

    /// Run the dispatcher against events read from stdin until shutdown is
    /// requested or the input ends.
    ///
    /// # Errors
    ///
    /// This function will return an error if the delivery resources cannot
    /// be created or reading the event feed fails.
    pub async fn run(self) -> anyhow::Result<()> {
        if self.webhooks.is_empty() {
            tracing::warn!("No webhooks configured, events will be read and dropped");
        }

        let dispatcher = Arc::new(Dispatcher::from_config(self.webhooks, &self.delivery)?);
        let bus = EventBus::new();

        internal!("Controller running");

        let serving = dispatcher.serve(bus.subscribe(), SHUTDOWN_BROADCAST.subscribe());
        let feeding = tokio::spawn(feed::run(
            BufReader::new(tokio::io::stdin()),
            bus,
            SHUTDOWN_BROADCAST.subscribe(),
        ));

        // The dispatcher stops once the feed ends (closing the bus) or a
        // shutdown signal arrives, after draining in-flight deliveries.
        let ret = tokio::select! {
            () = serving => Ok(()),
            r = shutdown() => r,
        };

        internal!("Shutting down...");

        if feeding.is_finished() {
            feeding.await??;
        } else {
            feeding.abort();
        }

        ret
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use porla_common::EventName;

    use super::*;

    #[test]
    fn test_from_toml() {
        let porla = Porla::from_toml(
            r#"
            [delivery]
            max_in_flight = 4

            [[webhooks]]
            url = "https://hooks.example.com/porla"
            on = ["torrent_added", "torrent_finished"]
            headers = [{ Authorization = "Bearer secret" }]
            payload = '{"event": {{ event_name|tojson }}}'

            [[webhooks]]
            url = "http://localhost:8080/removed"
            on = "torrent_removed"
            "#,
        )
        .unwrap();

        assert_eq!(porla.delivery.max_in_flight, 4);
        assert_eq!(porla.webhooks.len(), 2);
        assert!(porla.webhooks[0].listens_to(EventName::TorrentFinished));
        assert_eq!(porla.webhooks[1].payload, None);
    }

    #[test]
    fn test_empty_config() {
        let porla = Porla::from_toml("").unwrap();

        assert!(porla.webhooks.is_empty());
        assert_eq!(porla.delivery, DeliveryConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(Porla::from_toml("[[webhooks]").is_err());
        assert!(Porla::from_toml("[delivery]\nmax_in_flight = -1").is_err());
    }
}
