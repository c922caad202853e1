//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Normalize and bind the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Separate per-connection accept errors from fatal ones

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(String, std::io::Error),
    /// The accept loop failed in a way that leaves the listener unusable.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(_, e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// Host used for a bare port. Dual-stack on hosts where IPv6 is enabled.
const ANY_HOST: &str = "[::]";
/// Host used for a bare port when the IPv6 wildcard cannot be bound.
const ANY_HOST_V4: &str = "0.0.0.0";

/// Turn a bare port (`8443`) or `:8443` into `[::]:8443`, listening on every
/// interface; anything else is returned unchanged.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if let Some(port) = address.strip_prefix(':') {
        format!("{}:{}", ANY_HOST, port)
    } else if !address.contains(':') {
        format!("{}:{}", ANY_HOST, address)
    } else {
        address.to_string()
    }
}

/// IPv4 wildcard to retry with when binding the IPv6 wildcard `addr` failed
/// with `e`. `None` for explicit hosts and for errors IPv4 would repeat.
fn ipv4_fallback(addr: &str, e: &std::io::Error) -> Option<String> {
    if matches!(e.kind(), ErrorKind::AddrInUse | ErrorKind::PermissionDenied) {
        return None;
    }
    addr.strip_prefix(ANY_HOST)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(|port| format!("{}:{}", ANY_HOST_V4, port))
}

/// Accept errors that concern a single connection rather than the listener.
pub fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let mut addr = normalize_address(&config.bind_address);

        let listener = match TcpListener::bind(addr.as_str()).await {
            Ok(listener) => listener,
            Err(e) => match ipv4_fallback(&addr, &e) {
                Some(v4_addr) => {
                    tracing::debug!(error = %e, address = %v4_addr, "IPv6 wildcard unavailable, listening on IPv4 only");
                    addr = v4_addr;
                    TcpListener::bind(addr.as_str())
                        .await
                        .map_err(|e| ListenerError::Bind(addr.clone(), e))?
                }
                None => return Err(ListenerError::Bind(addr, e)),
            },
        };

        let local_addr = listener
            .local_addr()
            .map_err(|e| ListenerError::Bind(addr.clone(), e))?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached. Errors that
    /// only affect the incoming connection are skipped; any other error is
    /// returned and means the listener is no longer usable.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Accept(std::io::Error::other("connection limiter closed")))?;

        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(
                        peer_addr = %addr,
                        available_permits = self.available_permits(),
                        "Connection accepted"
                    );
                    return Ok((stream, addr, ConnectionPermit { _permit: permit }));
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Skipping failed incoming connection");
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bind_address: &str, max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: bind_address.to_string(),
            max_connections,
            handshake_timeout_secs: None,
        }
    }

    #[test]
    fn normalizes_bare_ports() {
        assert_eq!(normalize_address("8443"), "[::]:8443");
        assert_eq!(normalize_address(":8443"), "[::]:8443");
        assert_eq!(normalize_address("127.0.0.1:8443"), "127.0.0.1:8443");
        assert_eq!(normalize_address("localhost:8443"), "localhost:8443");
        assert_eq!(normalize_address("[::1]:8443"), "[::1]:8443");
    }

    #[test]
    fn classifies_accept_errors() {
        assert!(is_connection_error(&std::io::Error::from(ErrorKind::ConnectionAborted)));
        assert!(!is_connection_error(&std::io::Error::from(ErrorKind::PermissionDenied)));
    }

    #[test]
    fn only_the_ipv6_wildcard_falls_back() {
        let unavailable = std::io::Error::from(ErrorKind::AddrNotAvailable);
        assert_eq!(
            ipv4_fallback("[::]:8443", &unavailable).as_deref(),
            Some("0.0.0.0:8443")
        );
        assert_eq!(ipv4_fallback("[::1]:8443", &unavailable), None);
        assert_eq!(ipv4_fallback("127.0.0.1:8443", &unavailable), None);

        let in_use = std::io::Error::from(ErrorKind::AddrInUse);
        assert_eq!(ipv4_fallback("[::]:8443", &in_use), None);
    }

    #[tokio::test]
    async fn bare_port_listens_on_ipv4_and_ipv6() {
        let listener = Listener::bind(&config("0", 4)).await.unwrap();
        let local = listener.local_addr().unwrap();
        let port = local.port();

        TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        listener.accept().await.unwrap();

        if local.is_ipv6() {
            TcpStream::connect(("::1", port)).await.unwrap();
            let (_, peer, _) = listener.accept().await.unwrap();
            assert!(peer.is_ipv6());
        }
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let listener = Listener::bind(&config("127.0.0.1:0", 2)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_eq!(listener.max_connections(), 2);

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, peer, permit) = listener.accept().await.unwrap();
        assert!(peer.ip().is_loopback());
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Listener::bind(&config("127.0.0.1:0", 1)).await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let err = Listener::bind(&config(&taken, 1)).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind(ref addr, _) if *addr == taken));
    }
}
