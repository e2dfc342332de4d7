//! Test support utilities for webhook delivery tests
//!
//! Deliveries run against [`MockHttpServer`] instances on loopback, with
//! host names resolved by [`StaticResolver`].
#![allow(dead_code)] // Test utility module - not all helpers used in every test

pub mod mock_server;
pub mod resolver;

use std::{path::PathBuf, sync::Arc};

use porla_common::{InfoHash, TorrentStatus, config::DeliveryTimeouts};
use porla_webhook::{
    DeliveryContext, Dispatcher, TemplateRenderer, TlsSettings, Webhook, tls_connector,
};
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

pub use mock_server::{MockHttpServer, RecordedRequest};
pub use resolver::StaticResolver;

/// Host name every mock server is reachable under
pub const HOOK_HOST: &str = "hooks.test";

/// Also resolves to loopback, but no test certificate is issued for it
pub const OTHER_HOST: &str = "other.test";

/// Path of a file under `tests/certs`
#[must_use]
pub fn cert_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("certs")
        .join(name)
}

/// Start an HTTPS mock serving the `hooks.test` certificate signed by the
/// test CA
///
/// # Panics
///
/// Panics if the server cannot be started
pub async fn tls_server() -> MockHttpServer {
    MockHttpServer::builder()
        .with_tls(cert_path("hooks.test.pem"), cert_path("hooks.test.key"))
        .build()
        .await
        .expect("TLS mock server")
}

/// A TLS connector that trusts only the test CA in `tests/certs/ca.pem`
///
/// # Panics
///
/// Panics if the CA file cannot be loaded
#[must_use]
pub fn test_ca_connector() -> TlsConnector {
    tls_connector(&TlsSettings {
        native_roots: false,
        ca_file: Some(cert_path("ca.pem")),
    })
    .expect("test CA connector")
}

/// One second per stage keeps failure tests fast
#[must_use]
pub fn short_timeouts() -> DeliveryTimeouts {
    DeliveryTimeouts {
        resolve_secs: 1,
        connect_secs: 1,
        handshake_secs: 1,
        write_secs: 1,
        read_secs: 1,
    }
}

/// A TLS connector that trusts nothing; enough to drive a handshake
#[must_use]
pub fn untrusting_connector() -> TlsConnector {
    let config = ClientConfig::builder()
        .with_root_certificates(RootCertStore::empty())
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[must_use]
pub fn context() -> DeliveryContext {
    context_with_connector(untrusting_connector())
}

#[must_use]
pub fn context_with_connector(connector: TlsConnector) -> DeliveryContext {
    DeliveryContext {
        resolver: Arc::new(
            StaticResolver::new()
                .with_local_host(HOOK_HOST)
                .with_local_host(OTHER_HOST),
        ),
        connector,
        timeouts: short_timeouts(),
        max_response_bytes: 64 * 1024,
    }
}

#[must_use]
pub fn dispatcher(webhooks: Vec<Webhook>) -> Dispatcher {
    dispatcher_with_limit(webhooks, 0)
}

#[must_use]
pub fn dispatcher_with_limit(webhooks: Vec<Webhook>, max_in_flight: usize) -> Dispatcher {
    Dispatcher::new(webhooks, Arc::new(TemplateRenderer), context(), max_in_flight)
}

#[must_use]
pub fn dispatcher_with_context(webhooks: Vec<Webhook>, context: DeliveryContext) -> Dispatcher {
    Dispatcher::new(webhooks, Arc::new(TemplateRenderer), context, 0)
}

/// `http://hooks.test:<port><path>` for a mock server
#[must_use]
pub fn hook_url(server: &MockHttpServer, path: &str) -> String {
    format!("http://{HOOK_HOST}:{}{path}", server.port())
}

#[must_use]
pub fn torrent() -> TorrentStatus {
    TorrentStatus {
        info_hash: InfoHash::v1("abc123"),
        name: "ubuntu-24.04-desktop-amd64.iso".to_string(),
        progress: 0.5,
        save_path: "/downloads".to_string(),
        total: 6_000,
        total_done: 3_000,
        total_wanted: 6_000,
    }
}
