//! TLS acceptor construction from PEM files.

use crate::config::TlsSettings;
use anyhow::{Context as _, Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// Build the acceptor from the configured certificate chain and private
/// key. No client certificate is requested.
pub fn load_acceptor(settings: &TlsSettings) -> Result<TlsAcceptor> {
    let certs = load_certs(settings)?;
    let key = load_key(settings)?;
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate or key")?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(settings: &TlsSettings) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(&settings.certificate)
        .with_context(|| format!("opening certificate {}", settings.certificate.display()))?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::io::Result<_>>()
        .context("parsing certificate PEM")?;
    if certs.is_empty() {
        return Err(anyhow!(
            "no certificates found in {}",
            settings.certificate.display()
        ));
    }
    Ok(certs)
}

fn load_key(settings: &TlsSettings) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(&settings.private_key)
        .with_context(|| format!("opening private key {}", settings.private_key.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .context("parsing private key PEM")?
        .ok_or_else(|| {
            anyhow!(
                "no private key found in {}",
                settings.private_key.display()
            )
        })
}
