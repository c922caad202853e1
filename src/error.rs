//! Crate-level error type for startup and serving.

use crate::config::ConfigError;
use crate::identity::ProvisionError;
use crate::net::listener::ListenerError;
use crate::net::tls::TlsError;

/// Any error that stops the endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The blocking provisioning task panicked or was cancelled.
    #[error("identity provisioning task did not complete: {0}")]
    ProvisionTask(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(String),
}
