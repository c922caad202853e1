//! Ephemeral self-signed identity bound to a hostname.

use rcgen::{CertificateParams, DistinguishedName, DnType, Ia5String, KeyPair, SanType, SerialNumber};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls::pki_types::{DnsName, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::identity::types::{ProvisionError, ServerIdentity};

/// Modulus size of the generated RSA key.
pub const RSA_KEY_BITS: usize = 2048;

/// Serial number of every self-issued certificate. Uniqueness across
/// restarts is not needed for a throwaway identity.
pub const SELF_SIGNED_SERIAL: u64 = 1;

/// Hostname of this machine as reported by the OS.
pub fn local_hostname() -> Result<String, ProvisionError> {
    hostname::get()
        .map_err(|e| ProvisionError::Hostname(format!("cannot read hostname: {e}")))?
        .into_string()
        .map_err(|raw| ProvisionError::Hostname(format!("hostname {raw:?} is not valid UTF-8")))
}

/// Issue a self-signed RSA-2048 certificate whose subject CN and only DNS
/// SAN are `hostname`. Validity is left at the library defaults.
///
/// RSA key generation dominates startup latency.
pub fn issue_self_signed(hostname: &str) -> Result<ServerIdentity, ProvisionError> {
    DnsName::try_from(hostname)
        .map_err(|e| ProvisionError::Hostname(format!("'{hostname}' is not a DNS name: {e}")))?;
    let dns_name = Ia5String::try_from(hostname)
        .map_err(|e| ProvisionError::Hostname(format!("'{hostname}' is not a DNS name: {e}")))?;

    let key_pair = generate_rsa_key_pair()?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, hostname);
    params.distinguished_name = dn;
    params.subject_alt_names = vec![SanType::DnsName(dns_name)];
    params.serial_number = Some(SerialNumber::from(SELF_SIGNED_SERIAL));

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| ProvisionError::CertificateEncoding(e.to_string()))?;

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let identity = ServerIdentity::from_parts(vec![cert.der().clone()], key)
        .map_err(ProvisionError::CertificateEncoding)?;

    tracing::info!(
        hostname = %hostname,
        key_bits = RSA_KEY_BITS,
        "Issued self-signed server identity"
    );

    Ok(identity)
}

fn generate_rsa_key_pair() -> Result<KeyPair, ProvisionError> {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| ProvisionError::KeyGeneration(e.to_string()))?;
    let pkcs8 = private_key
        .to_pkcs8_der()
        .map_err(|e| ProvisionError::KeyGeneration(e.to_string()))?;

    KeyPair::try_from(pkcs8.as_bytes()).map_err(|e| ProvisionError::KeyGeneration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_hostname_to_subject_and_san() {
        let identity = issue_self_signed("echo.internal").unwrap();
        let leaf = identity.leaf();

        assert_eq!(leaf.common_name.as_deref(), Some("echo.internal"));
        assert_eq!(leaf.dns_names, vec!["echo.internal".to_string()]);
        assert_eq!(leaf.subject, "CN=echo.internal");
        assert_eq!(leaf.issuer, leaf.subject);
        assert_eq!(leaf.serial, "1");
        identity.check_keys_match().unwrap();
    }

    #[test]
    fn rejects_non_ascii_hostname() {
        let err = issue_self_signed("héllo").unwrap_err();
        assert!(matches!(err, ProvisionError::Hostname(_)));
    }

    #[test]
    fn rejects_ascii_that_is_not_a_dns_name() {
        for bad in ["two words", "a..b", ""] {
            let err = issue_self_signed(bad).unwrap_err();
            assert!(matches!(err, ProvisionError::Hostname(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn local_hostname_is_not_empty() {
        assert!(!local_hostname().unwrap().is_empty());
    }
}
