//! Client certificate policy and the peer-chain hook.
//!
//! # Responsibilities
//! - Demand a client certificate on every handshake
//! - Accept any certificate: no chain-of-trust validation, no CA pool
//! - Still verify handshake signatures so the client proves key possession
//! - Hand the presented chain to a [`PeerChainObserver`] once per connection
//!
//! # Design Decisions
//! - Trusts nothing and logs everything; content never causes a rejection
//! - The observer is called after rustls finishes the handshake, so a client
//!   that fails the signature check is dropped without producing a log line
//! - Observers are synchronous and must return quickly

use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};

/// Client certificate verifier that requires a certificate and accepts
/// whatever is presented.
#[derive(Debug)]
pub struct AcceptAnyClientCert {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyClientCert {
    /// Create a verifier using the signature algorithms of `provider`.
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Certificates presented by a client, leaf first. Never empty.
#[derive(Debug, Clone, Copy)]
pub struct PeerCertificateChain<'a> {
    certs: &'a [CertificateDer<'a>],
}

impl<'a> PeerCertificateChain<'a> {
    /// Wrap a presented chain; `None` when no certificate was presented.
    pub fn new(certs: &'a [CertificateDer<'a>]) -> Option<Self> {
        if certs.is_empty() {
            None
        } else {
            Some(Self { certs })
        }
    }

    /// End-entity certificate.
    pub fn leaf(&self) -> &'a CertificateDer<'a> {
        &self.certs[0]
    }

    /// All certificates, leaf first.
    pub fn certs(&self) -> &'a [CertificateDer<'a>] {
        self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Synchronous hook run once per established connection with the client's
/// certificate chain.
///
/// Implementations must not block for long and cannot reject the
/// connection.
pub trait PeerChainObserver: Send + Sync {
    fn observe(&self, chain: &PeerCertificateChain<'_>);
}
