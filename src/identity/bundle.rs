//! Operator-supplied PEM bundle loading.
//!
//! The bundle holds the certificate chain and the private key in one file,
//! which serves as both the certificate source and the key source.

use std::fs;
use std::path::Path;

use rustls::pki_types::CertificateDer;

use crate::identity::types::{ProvisionError, ServerIdentity};

/// Load a server identity from a combined certificate + key PEM file.
///
/// Supports PKCS#8 (`PRIVATE KEY`), PKCS#1 (`RSA PRIVATE KEY`) and SEC1
/// (`EC PRIVATE KEY`) keys. The key must match the leaf certificate.
pub fn load_pem_bundle(path: &Path) -> Result<ServerIdentity, ProvisionError> {
    let pem_data = fs::read(path)
        .map_err(|e| ProvisionError::credential_load(path, format!("cannot read file: {e}")))?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem_data.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProvisionError::credential_load(path, format!("malformed certificate: {e}")))?;
    if certs.is_empty() {
        return Err(ProvisionError::credential_load(path, "no certificate found"));
    }

    let key = rustls_pemfile::private_key(&mut pem_data.as_slice())
        .map_err(|e| ProvisionError::credential_load(path, format!("malformed private key: {e}")))?
        .ok_or_else(|| ProvisionError::credential_load(path, "no private key found"))?;

    let identity = ServerIdentity::from_parts(certs, key)
        .map_err(|reason| ProvisionError::credential_load(path, reason))?;
    identity.check_keys_match().map_err(|e| {
        ProvisionError::credential_load(path, format!("private key does not match certificate: {e}"))
    })?;

    tracing::info!(
        path = %path.display(),
        subject = %identity.leaf().subject,
        chain_len = identity.cert_chain().len(),
        "Loaded server identity"
    );

    Ok(identity)
}
