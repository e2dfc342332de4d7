//! Byte-stream transport for deliveries: plain TCP or TLS over TCP.
//!
//! Both variants expose the same `write_all`/`read` surface, so the pipeline
//! only has to decide whether a handshake is needed.

use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{TlsConnector, client::TlsStream, rustls::pki_types::ServerName};
use tracing::debug;

use crate::error::DeliveryError;

pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Connects to the first candidate that accepts.
    ///
    /// # Errors
    ///
    /// Returns the last connection error if every candidate fails.
    pub async fn connect(candidates: &[SocketAddr]) -> Result<Self, DeliveryError> {
        let mut last_error =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to");

        for addr in candidates {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!("Connected to {addr}");
                    return Ok(Self::Plain(stream));
                }
                Err(err) => {
                    debug!("Connection to {addr} failed: {err}");
                    last_error = err;
                }
            }
        }

        Err(DeliveryError::Connect(last_error))
    }

    /// Wraps a plain connection in TLS, sending `host` as the SNI name and
    /// verifying the peer certificate against it.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Handshake` if `host` is not a valid server
    /// name, the connection is already TLS, or the handshake fails.
    pub async fn handshake(self, connector: &TlsConnector, host: &str) -> Result<Self, DeliveryError> {
        match self {
            Self::Plain(stream) => {
                let server_name = ServerName::try_from(host.to_string())
                    .map_err(|e| DeliveryError::Handshake(format!("Invalid server name {host}: {e}")))?;

                let tls_stream = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| DeliveryError::Handshake(e.to_string()))?;

                Ok(Self::Tls(Box::new(tls_stream)))
            }
            Self::Tls(_) => Err(DeliveryError::Handshake(
                "Connection is already TLS".to_string(),
            )),
        }
    }

    /// Writes all of `data` and flushes it to the peer.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Write` on any I/O failure.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), DeliveryError> {
        match self {
            Self::Plain(stream) => {
                stream.write_all(data).await.map_err(DeliveryError::Write)?;
                stream.flush().await.map_err(DeliveryError::Write)
            }
            Self::Tls(stream) => {
                stream.write_all(data).await.map_err(DeliveryError::Write)?;
                stream.flush().await.map_err(DeliveryError::Write)
            }
        }
    }

    /// Reads whatever is available into `buf`; `0` means the peer closed.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Read` on any I/O failure.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeliveryError> {
        let read = match self {
            Self::Plain(stream) => stream.read(buf).await,
            Self::Tls(stream) => stream.read(buf).await,
        };

        read.map_err(DeliveryError::Read)
    }

    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}
