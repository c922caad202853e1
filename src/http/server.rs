//! Mutual-TLS server: accept loop and per-connection pipeline.
//!
//! # Responsibilities
//! - Accept TCP connections from the bounded listener
//! - Run the TLS handshake (optionally bounded by a timeout)
//! - Hand the peer certificate chain to the observer before serving
//! - Serve HTTP/1.1 and HTTP/2 on the established stream
//! - Stop accepting when the shutdown signal fires
//!
//! # Design Decisions
//! - One Tokio task per connection; no custom scheduling
//! - Handshake failures are per-connection: logged at debug, never fatal
//! - Only a failing listener ends the accept loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tower::Service;

use crate::config::ListenerConfig;
use crate::http::handler;
use crate::net::connection::{ConnectionGuard, ConnectionState, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::verifier::{PeerCertificateChain, PeerChainObserver};
use crate::observability::metrics;

/// State shared by every connection task.
struct Shared {
    acceptor: TlsAcceptor,
    observer: Arc<dyn PeerChainObserver>,
    router: Router,
    handshake_timeout: Option<Duration>,
}

/// The mutual-TLS echo server.
pub struct EchoServer {
    shared: Arc<Shared>,
    tracker: ConnectionTracker,
}

impl EchoServer {
    /// Create a server from a TLS acceptor and the peer-chain observer.
    pub fn new(
        acceptor: TlsAcceptor,
        observer: Arc<dyn PeerChainObserver>,
        config: &ListenerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                acceptor,
                observer,
                router: handler::router(),
                handshake_timeout: config.handshake_timeout_secs.map(Duration::from_secs),
            }),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Tracker of open connections, for draining on shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run the accept loop until `shutdown` fires or the listener fails.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                max_connections = listener.max_connections(),
                "mTLS server accepting connections"
            );
        }

        loop {
            let (stream, peer_addr, permit) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = self.tracker.active_count(),
                        "Shutdown signal received, no longer accepting"
                    );
                    return Ok(());
                }
            };

            let guard = self.tracker.track();
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                metrics::record_connection_accepted();
                handle_connection(shared, stream, peer_addr, permit, guard).await;
                metrics::record_connection_closed();
            });
        }
    }
}

async fn handle_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    peer_addr: SocketAddr,
    _permit: ConnectionPermit,
    mut guard: ConnectionGuard,
) {
    let connection_id = guard.id();
    guard.transition(ConnectionState::Handshaking);

    let handshake = shared.acceptor.accept(stream);
    let result = match shared.handshake_timeout {
        Some(limit) => match tokio::time::timeout(limit, handshake).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(%connection_id, %peer_addr, timeout = ?limit, "TLS handshake timed out");
                metrics::record_handshake_failed("timeout");
                guard.transition(ConnectionState::HandshakeFailed);
                guard.transition(ConnectionState::Closed);
                return;
            }
        },
        None => handshake.await,
    };

    let tls_stream = match result {
        Ok(tls_stream) => tls_stream,
        Err(e) => {
            tracing::debug!(%connection_id, %peer_addr, error = %e, "TLS handshake failed");
            metrics::record_handshake_failed("error");
            guard.transition(ConnectionState::HandshakeFailed);
            guard.transition(ConnectionState::Closed);
            return;
        }
    };

    {
        let (_, session) = tls_stream.get_ref();
        let chain = session
            .peer_certificates()
            .and_then(|certs| PeerCertificateChain::new(certs));
        match chain {
            Some(chain) => {
                shared.observer.observe(&chain);
                tracing::debug!(%connection_id, %peer_addr, chain_len = chain.len(), "Client certificate chain logged");
            }
            None => {
                // Client auth is mandatory, so rustls never completes without a chain.
                tracing::warn!(%connection_id, %peer_addr, "Handshake completed without a client certificate");
                guard.transition(ConnectionState::HandshakeFailed);
                guard.transition(ConnectionState::Closed);
                return;
            }
        }
    }
    guard.transition(ConnectionState::Established);

    guard.transition(ConnectionState::Serving);
    let router = shared.router.clone();
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        router.clone().call(request)
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
    {
        tracing::debug!(%connection_id, %peer_addr, error = %e, "Connection ended with error");
    }
    guard.transition(ConnectionState::Closed);
}
