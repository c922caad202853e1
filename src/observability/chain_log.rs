//! Serialized client certificate chain log.
//!
//! One line per established connection:
//!
//! ```text
//! client cert issuer: <issuer DN>, subject: <subject DN>, chain (leaf first):
//! -----BEGIN CERTIFICATE-----
//! ...
//! -----END CERTIFICATE-----
//! ```
//!
//! Lines from concurrent handshakes never interleave: the sink is guarded by
//! a lock held from formatting until after the flush.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use pem::{EncodeConfig, LineEnding, Pem};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::net::verifier::{PeerCertificateChain, PeerChainObserver};
use crate::observability::metrics;

const UNPARSEABLE: &str = "<unparseable>";

/// Writes client certificate chains to a shared sink, one line at a time.
pub struct ChainLogger {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl ChainLogger {
    /// Log to an arbitrary sink.
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Log to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Write one line for `chain`. Write failures are reported through
    /// tracing and otherwise ignored.
    pub fn log_chain(&self, chain: &PeerCertificateChain<'_>) {
        // A panic while holding the lock only poisons it; the sink is still usable.
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);

        let line = format_log_line(chain);
        let result = sink
            .write_all(line.as_bytes())
            .and_then(|()| sink.flush());
        drop(sink);

        match result {
            Ok(()) => metrics::record_chain_logged(),
            Err(e) => tracing::warn!(error = %e, "Failed to write client certificate chain"),
        }
    }
}

impl PeerChainObserver for ChainLogger {
    fn observe(&self, chain: &PeerCertificateChain<'_>) {
        self.log_chain(chain);
    }
}

impl std::fmt::Debug for ChainLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainLogger").finish_non_exhaustive()
    }
}

/// Format the log line for a chain, including the trailing newline.
pub fn format_log_line(chain: &PeerCertificateChain<'_>) -> String {
    let (issuer, subject) = match X509Certificate::from_der(chain.leaf().as_ref()) {
        Ok((_, leaf)) => (leaf.issuer().to_string(), leaf.subject().to_string()),
        Err(_) => (UNPARSEABLE.to_string(), UNPARSEABLE.to_string()),
    };

    let chain_pem: Vec<String> = chain
        .certs()
        .iter()
        .map(|cert| pem_encode("CERTIFICATE", cert.as_ref()))
        .collect();

    format!(
        "client cert issuer: {}, subject: {}, chain (leaf first):\n{}\n",
        issuer,
        subject,
        chain_pem.join("\n")
    )
}

/// PEM-encode DER bytes under `tag` with LF line endings.
pub fn pem_encode(tag: &str, der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new(tag, der.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}
