//! rustls client configuration for TLS and secure WebSocket connections.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use multimeter_core::TlsVersion;
use rumqttc::tokio_rustls::rustls::{
    self, pki_types::CertificateDer, ClientConfig, RootCertStore, SupportedProtocolVersion,
};

use crate::error::TransportError;
use crate::options::TlsOptions;

/// Builds a client config restricted to the selected protocol version.
pub fn build_client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, TransportError> {
    let versions: &[&'static SupportedProtocolVersion] = match options.version {
        TlsVersion::None => {
            return Err(TransportError::Tls("TLS is not enabled".to_string()));
        }
        TlsVersion::Tls12 => &[&rustls::version::TLS12],
        TlsVersion::Tls13 => &[&rustls::version::TLS13],
    };

    let mut roots = RootCertStore::empty();
    match options.ca_path.as_deref() {
        Some(ca_path) => {
            for cert in load_certs(ca_path)? {
                roots
                    .add(cert)
                    .map_err(|e| TransportError::Tls(format!("Failed to add CA cert: {}", e)))?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    let config = ClientConfig::builder_with_protocol_versions(versions)
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Load certificates from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let file = File::open(path).map_err(|e| {
        TransportError::Tls(format!(
            "Failed to open cert file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            TransportError::Tls(format!(
                "Failed to parse certs from '{}': {}",
                path.display(),
                e
            ))
        })?;

    if certs.is_empty() {
        return Err(TransportError::Tls(format!(
            "No certificates found in '{}'",
            path.display()
        )));
    }

    Ok(certs)
}
