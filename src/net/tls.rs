//! TLS configuration for the mutual-TLS listener.
//!
//! # Responsibilities
//! - Build the rustls `ServerConfig` from the provisioned identity
//! - Install the accept-any client certificate policy
//! - Advertise HTTP/2 and HTTP/1.1 via ALPN

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::identity::ServerIdentity;
use crate::net::verifier::AcceptAnyClientCert;

/// Error type for TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to build TLS config: {0}")]
    Config(#[from] rustls::Error),
}

/// Crypto provider used for both the handshake and client signature checks.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a server config that requires, but does not validate, a client
/// certificate. TLS 1.2 and 1.3 are enabled.
pub fn build_server_config(identity: &ServerIdentity) -> Result<ServerConfig, TlsError> {
    let provider = crypto_provider();
    let client_verifier = Arc::new(AcceptAnyClientCert::new(Arc::clone(&provider)));

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(
            identity.cert_chain().to_vec(),
            identity.private_key().clone_key(),
        )?;

    // Prefer HTTP/2, fall back to HTTP/1.1
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::debug!(
        subject = %identity.leaf().subject,
        "mTLS config built (client certificate required, issuer unchecked)"
    );

    Ok(config)
}

/// Build a handshake acceptor for `identity`.
pub fn build_acceptor(identity: &ServerIdentity) -> Result<TlsAcceptor, TlsError> {
    Ok(TlsAcceptor::from(Arc::new(build_server_config(identity)?)))
}
