//! Mock HTTP endpoint for webhook delivery tests
//!
//! This module provides a configurable mock webhook receiver that can:
//! - Answer with any status code and body
//! - Stall after reading the request, or close without answering
//! - Record every request it receives for verification
//! - Track how many requests were waiting for a response at once
//! - Terminate TLS with a given certificate and key
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_server::MockHttpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockHttpServer::builder().with_status(202).build().await?;
//!
//! // Point a webhook at support::hook_url(&server, "/hook") and trigger an event
//!
//! let requests = server.wait_for_requests(1, std::time::Duration::from_secs(5)).await;
//! server.shutdown();
//! # Ok(())
//! # }
//! ```
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    fs::File,
    io::{self, BufReader},
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::RwLock,
    time::timeout,
};
use tokio_rustls::{TlsAcceptor, rustls::ServerConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An HTTP request as seen by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    /// Headers in wire order, names as sent
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Server name the client sent during the TLS handshake
    pub sni: Option<String>,
}

impl RecordedRequest {
    /// All values sent under `name`, compared case-insensitively
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().copied()
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Respond,
    Stall,
    Close,
}

#[derive(Clone)]
struct MockServerConfig {
    status: u16,
    body: String,
    behaviour: Behaviour,
    response_delay: Option<Duration>,
    tls: Option<(PathBuf, PathBuf)>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            status: 200,
            body: "ok".to_string(),
            behaviour: Behaviour::Respond,
            response_delay: None,
            tls: None,
        }
    }
}

#[derive(Default)]
struct Pending {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Mock webhook receiver for testing
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    pending: Arc<Pending>,
    shutdown: Arc<AtomicBool>,
}

impl MockHttpServer {
    /// Create a new builder for configuring the mock server
    #[must_use]
    pub fn builder() -> MockHttpServerBuilder {
        MockHttpServerBuilder::new()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Get all requests received by the server
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Poll until at least `count` requests arrived or `limit` elapsed
    pub async fn wait_for_requests(&self, count: usize, limit: Duration) -> Vec<RecordedRequest> {
        let start = tokio::time::Instant::now();

        loop {
            let requests = self.requests().await;
            if requests.len() >= count || start.elapsed() > limit {
                return requests;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Highest number of requests that were waiting for a response at the
    /// same time
    #[must_use]
    pub fn peak_pending(&self) -> usize {
        self.pending.peak.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Handle a single client connection: one request, at most one response
    async fn handle_client<S>(
        mut stream: S,
        sni: Option<String>,
        config: Arc<MockServerConfig>,
        requests: Arc<RwLock<Vec<RecordedRequest>>>,
        pending: Arc<Pending>,
    ) -> Result<(), BoxError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        let (mut request, body_start, content_length) = loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..read]);

            let mut headers = [httparse::EMPTY_HEADER; 64];
            let mut parsed = httparse::Request::new(&mut headers);

            if let httparse::Status::Complete(head_len) = parsed.parse(&buffer)? {
                let headers: Vec<(String, String)> = parsed
                    .headers
                    .iter()
                    .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                    .collect();

                let content_length = headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.parse::<usize>().ok())
                    .unwrap_or(0);

                break (
                    RecordedRequest {
                        method: parsed.method.unwrap_or_default().to_string(),
                        target: parsed.path.unwrap_or_default().to_string(),
                        headers,
                        body: Vec::new(),
                        sni,
                    },
                    head_len,
                    content_length,
                );
            }
        };

        while buffer.len() < body_start + content_length {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        let body_end = buffer.len().min(body_start + content_length);
        request.body = buffer[body_start..body_end].to_vec();

        tracing::debug!("Mock server received: {} {}", request.method, request.target);
        requests.write().await.push(request);

        match config.behaviour {
            Behaviour::Close => return Ok(()),
            Behaviour::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }
            Behaviour::Respond => {}
        }

        let waiting = pending.current.fetch_add(1, Ordering::SeqCst) + 1;
        pending.peak.fetch_max(waiting, Ordering::SeqCst);

        if let Some(delay) = config.response_delay {
            tokio::time::sleep(delay).await;
        }

        pending.current.fetch_sub(1, Ordering::SeqCst);

        let response = format!(
            "HTTP/1.1 {} Mock\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            config.status,
            config.body.len(),
            config.body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;

        Ok(())
    }
}

/// Builder for configuring a `MockHttpServer`
pub struct MockHttpServerBuilder {
    config: MockServerConfig,
}

impl MockHttpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    /// Set the response status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.config.status = status;
        self
    }

    /// Set the response body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.config.body = body.into();
        self
    }

    /// Wait before answering each request
    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Read the request, then never answer
    #[must_use]
    pub const fn with_stall(mut self) -> Self {
        self.config.behaviour = Behaviour::Stall;
        self
    }

    /// Read the request, then close without answering
    #[must_use]
    pub const fn with_close_without_response(mut self) -> Self {
        self.config.behaviour = Behaviour::Close;
        self
    }

    /// Serve HTTPS using the PEM certificate chain and private key at the
    /// given paths
    #[must_use]
    pub fn with_tls(mut self, certificate: impl AsRef<Path>, key: impl AsRef<Path>) -> Self {
        self.config.tls = Some((
            certificate.as_ref().to_path_buf(),
            key.as_ref().to_path_buf(),
        ));
        self
    }

    fn acceptor(certificate: &Path, key: &Path) -> Result<TlsAcceptor, io::Error> {
        let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(certificate)?))
            .collect::<Result<Vec<_>, _>>()?;
        let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key)?))?
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))?;

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(io::Error::other)?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }

    /// Build and start the mock HTTP server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port or the TLS
    /// certificate and key cannot be loaded
    pub async fn build(self) -> Result<MockHttpServer, io::Error> {
        let acceptor = match &self.config.tls {
            Some((certificate, key)) => Some(Self::acceptor(certificate, key)?),
            None => None,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let requests = Arc::new(RwLock::new(Vec::new()));
        let pending = Arc::new(Pending::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let requests_clone = Arc::clone(&requests);
        let pending_clone = Arc::clone(&pending);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept connection with timeout to allow checking shutdown flag
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let config = Arc::clone(&config);
                    let requests = Arc::clone(&requests_clone);
                    let pending = Arc::clone(&pending_clone);
                    let acceptor = acceptor.clone();

                    tokio::spawn(async move {
                        let result = match acceptor {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(stream) => {
                                    let sni = stream.get_ref().1.server_name().map(str::to_string);
                                    MockHttpServer::handle_client(
                                        stream, sni, config, requests, pending,
                                    )
                                    .await
                                }
                                Err(e) => Err(e.into()),
                            },
                            None => {
                                MockHttpServer::handle_client(stream, None, config, requests, pending)
                                    .await
                            }
                        };

                        if let Err(e) = result {
                            tracing::debug!("Mock server client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(MockHttpServer {
            addr,
            requests,
            pending,
            shutdown,
        })
    }
}
