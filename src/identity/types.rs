//! Server identity types.

use std::path::PathBuf;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

/// Errors raised while provisioning the server identity.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The operator-supplied PEM bundle could not be used.
    #[error("failed to load credentials from {path:?}: {reason}")]
    CredentialLoad { path: PathBuf, reason: String },

    /// The local hostname could not be determined or is not a DNS name.
    #[error("unusable hostname: {0}")]
    Hostname(String),

    /// Key pair generation failed.
    #[error("failed to generate private key: {0}")]
    KeyGeneration(String),

    /// The self-signed certificate could not be built or parsed back.
    #[error("failed to create certificate: {0}")]
    CertificateEncoding(String),
}

impl ProvisionError {
    pub(crate) fn credential_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CredentialLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Parsed view of the leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSummary {
    /// Subject distinguished name (`CN=host`).
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// First subject common name, if any.
    pub common_name: Option<String>,
    /// DNS entries of the subject alternative name extension.
    pub dns_names: Vec<String>,
    /// Serial number in decimal.
    pub serial: String,
}

impl LeafSummary {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| format!("failed to parse certificate: {e}"))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut dns_names = Vec::new();
        if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
            for name in &san_ext.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push((*dns).to_owned());
                }
            }
        }

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            dns_names,
            serial: cert.serial.to_string(),
        })
    }
}

/// The server's own TLS identity: certificate chain, private key and the
/// parsed leaf.
///
/// Created once at startup and only read afterwards.
pub struct ServerIdentity {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    leaf: LeafSummary,
}

impl ServerIdentity {
    /// Assemble an identity, parsing the leaf certificate.
    ///
    /// The chain must not be empty. The key is not checked against the
    /// certificate here; see [`ServerIdentity::check_keys_match`].
    pub fn from_parts(
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, String> {
        let leaf_der = cert_chain
            .first()
            .ok_or_else(|| "certificate chain is empty".to_string())?;
        let leaf = LeafSummary::from_der(leaf_der)?;

        Ok(Self {
            cert_chain,
            key,
            leaf,
        })
    }

    /// Certificate chain, leaf first.
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Private key matching the leaf certificate.
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// Parsed leaf certificate.
    pub fn leaf(&self) -> &LeafSummary {
        &self.leaf
    }

    /// Confirm the private key belongs to the leaf certificate.
    pub fn check_keys_match(&self) -> Result<(), rustls::Error> {
        let provider = rustls::crypto::ring::default_provider();
        let signing_key = provider.key_provider.load_private_key(self.key.clone_key())?;
        CertifiedKey::new(self.cert_chain.clone(), signing_key).keys_match()
    }

    /// Render the identity as a single PEM bundle (certificates, then key),
    /// the same format accepted as a credential file.
    pub fn to_pem_bundle(&self) -> String {
        let mut bundle = String::new();
        for cert in &self.cert_chain {
            bundle.push_str(&crate::observability::chain_log::pem_encode(
                "CERTIFICATE",
                cert.as_ref(),
            ));
        }
        let tag = match &self.key {
            PrivateKeyDer::Pkcs1(_) => "RSA PRIVATE KEY",
            PrivateKeyDer::Sec1(_) => "EC PRIVATE KEY",
            _ => "PRIVATE KEY",
        };
        bundle.push_str(&crate::observability::chain_log::pem_encode(
            tag,
            self.key.secret_der(),
        ));
        bundle
    }
}

impl std::fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("leaf", &self.leaf)
            .field("chain_len", &self.cert_chain.len())
            .finish()
    }
}
