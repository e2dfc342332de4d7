//! TLS client configuration for `https` endpoints.
//!
//! The connector is built once and shared read-only by every delivery.
//! Server certificates are always verified against the configured roots.

use std::{fs::File, io::BufReader, sync::Arc};

use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};
use tracing::{debug, warn};

use crate::{config::TlsSettings, error::TlsError};

fn root_store(settings: &TlsSettings) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();

    if settings.native_roots {
        let native = rustls_native_certs::load_native_certs();
        // Log errors but don't fail if some certs couldn't be loaded
        if !native.errors.is_empty() {
            warn!(?native.errors, "Some certificates could not be loaded");
        }

        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!("Loaded {added} native root certificate(s), ignored {ignored}");
    }

    if let Some(path) = &settings.ca_file {
        let load_error = |source| TlsError::CertificateLoad {
            path: path.display().to_string(),
            source,
        };

        let mut reader = BufReader::new(File::open(path).map_err(load_error)?);
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert.map_err(load_error)?)?;
        }
    }

    if roots.is_empty() {
        return Err(TlsError::NoRootCertificates);
    }

    Ok(roots)
}

/// Build the shared TLS connector.
///
/// # Errors
///
/// Returns `TlsError` if the CA file cannot be read or parsed, or if no
/// trust roots are available at all.
pub fn connector(settings: &TlsSettings) -> Result<TlsConnector, TlsError> {
    let config = ClientConfig::builder()
        .with_root_certificates(root_store(settings)?)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
