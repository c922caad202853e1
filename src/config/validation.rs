//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EchoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tracing::level_filters::LevelFilter;

use crate::config::schema::EchoConfig;
use crate::net::listener::normalize_address;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a port or host:port")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    MaxConnections,

    #[error("listener.handshake_timeout_secs must be greater than zero when set")]
    HandshakeTimeout,

    #[error("identity.hostname must not be empty")]
    EmptyHostname,

    #[error("observability.log_level '{0}' is not a valid level")]
    LogLevel(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &EchoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !has_valid_port(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if config.listener.handshake_timeout_secs == Some(0) {
        errors.push(ValidationError::HandshakeTimeout);
    }

    if matches!(&config.identity.hostname, Some(h) if h.trim().is_empty()) {
        errors.push(ValidationError::EmptyHostname);
    }

    let observability = &config.observability;
    if observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::LogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The host part is resolved at bind time; only the port can be checked here.
fn has_valid_port(address: &str) -> bool {
    let normalized = normalize_address(address);
    match normalized.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
