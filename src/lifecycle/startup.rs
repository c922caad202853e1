//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the metrics endpoint when enabled
//! - Provision the server identity
//! - Build the TLS acceptor and bind the listener
//! - Serve until shutdown, then drain open connections
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The identity is provisioned before binding, so a bad credential file
//!   never leaves a listener behind
//! - Draining is bounded; stragglers are abandoned after the deadline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{validate_config, ConfigError, EchoConfig};
use crate::error::Error;
use crate::http::EchoServer;
use crate::identity::{provision, IdentitySource};
use crate::lifecycle::Shutdown;
use crate::net::listener::Listener;
use crate::net::tls::build_acceptor;
use crate::net::verifier::PeerChainObserver;
use crate::observability::{metrics, ChainLogger};

/// How long shutdown waits for open connections to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A server ready to accept, with its listener already bound.
pub struct Prepared {
    pub server: EchoServer,
    pub listener: Listener,
}

impl Prepared {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Validate the config, provision the identity, build TLS and bind.
///
/// `observer` receives every client chain; production passes the stdout
/// [`ChainLogger`].
pub async fn prepare(
    config: &EchoConfig,
    observer: Arc<dyn PeerChainObserver>,
) -> Result<Prepared, Error> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let source = IdentitySource::from(&config.identity);
    // RSA key generation is CPU bound.
    let identity = tokio::task::spawn_blocking(move || provision(&source)).await??;

    let acceptor = build_acceptor(&identity)?;
    let listener = Listener::bind(&config.listener).await?;
    let server = EchoServer::new(acceptor, observer, &config.listener);

    Ok(Prepared { server, listener })
}

/// Run the endpoint until `shutdown` fires.
pub async fn run(config: EchoConfig, shutdown: &Shutdown) -> Result<(), Error> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| Error::Metrics(format!("invalid metrics address: {e}")))?;
        metrics::init_metrics(addr).map_err(|e| Error::Metrics(e.to_string()))?;
    }

    let Prepared { server, listener } = prepare(&config, Arc::new(ChainLogger::stdout())).await?;
    let tracker = server.tracker();

    server.run(listener, shutdown.subscribe()).await?;

    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait_for_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = tracker.active_count(),
            "Connections still open after drain timeout"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
