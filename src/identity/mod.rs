//! Server identity provisioning subsystem.
//!
//! # Data Flow
//! ```text
//! IdentitySource::PemBundle(path)
//!     → bundle.rs (read PEM, parse certs + key, check pairing)
//! IdentitySource::SelfSigned { hostname }
//!     → self_signed.rs (hostname → RSA-2048 key → self-signed cert)
//!     → ServerIdentity (held read-only for the listener's lifetime)
//! ```
//!
//! # Design Decisions
//! - Provisioning happens once, before the listener binds
//! - Any provisioning failure is fatal to startup
//! - No rotation or reload of the identity

pub mod bundle;
pub mod self_signed;
pub mod types;

use std::path::PathBuf;

pub use bundle::load_pem_bundle;
pub use self_signed::{issue_self_signed, local_hostname};
pub use types::{LeafSummary, ProvisionError, ServerIdentity};

use crate::config::IdentityConfig;

/// Where the server identity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Combined certificate + key PEM file supplied by the operator.
    PemBundle(PathBuf),
    /// Fresh self-signed identity; `None` means the OS hostname.
    SelfSigned { hostname: Option<String> },
}

impl From<&IdentityConfig> for IdentitySource {
    fn from(config: &IdentityConfig) -> Self {
        match &config.pem_file {
            Some(path) => IdentitySource::PemBundle(path.clone()),
            None => IdentitySource::SelfSigned {
                hostname: config.hostname.clone(),
            },
        }
    }
}

/// Produce the server identity from the given source.
pub fn provision(source: &IdentitySource) -> Result<ServerIdentity, ProvisionError> {
    match source {
        IdentitySource::PemBundle(path) => load_pem_bundle(path),
        IdentitySource::SelfSigned { hostname } => {
            let hostname = match hostname {
                Some(name) => name.clone(),
                None => local_hostname()?,
            };
            issue_self_signed(&hostname)
        }
    }
}
