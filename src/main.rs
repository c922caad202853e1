//! cert-echo: diagnostic mutual-TLS endpoint.
//!
//! ```text
//!     TLS client ──▶ listener ──▶ handshake (client cert required, never validated)
//!                                     │
//!                                     ├──▶ chain logger ──▶ stdout (one line per connection)
//!                                     │
//!                                     └──▶ HTTP ──▶ 200 "OK"
//! ```
//!
//! Usage: `cert-echo <address> [pem-file]`. Without a PEM file a self-signed
//! identity for the local hostname is issued at startup.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cert_echo::config::{read_config, validate_config, ConfigError, EchoConfig, LogFormat};
use cert_echo::lifecycle::{signals, startup, Shutdown};
use cert_echo::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "cert-echo", version)]
#[command(about = "Accepts mTLS connections and prints every client certificate chain")]
struct Cli {
    /// Listen address: a bare port, `:port` or `host:port`
    #[arg(required_unless_present = "config")]
    address: Option<String>,

    /// PEM file holding both the server certificate and its private key
    pem_file: Option<PathBuf>,

    /// TOML configuration file; command-line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hostname for the self-signed identity (defaults to the OS hostname)
    #[arg(long)]
    hostname: Option<String>,

    /// Log level for diagnostic output on stderr
    #[arg(long)]
    log_level: Option<String>,

    /// Emit diagnostic logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// TLS handshake timeout in seconds
    #[arg(long, conflicts_with = "no_handshake_timeout")]
    handshake_timeout_secs: Option<u64>,

    /// Let handshakes run without a time limit
    #[arg(long)]
    no_handshake_timeout: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    /// Merge the optional config file with command-line overrides.
    fn into_config(self) -> Result<EchoConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => EchoConfig::default(),
        };

        if let Some(address) = self.address {
            config.listener.bind_address = address;
        }
        if let Some(max) = self.max_connections {
            config.listener.max_connections = max;
        }
        if self.no_handshake_timeout {
            config.listener.handshake_timeout_secs = None;
        } else if let Some(secs) = self.handshake_timeout_secs {
            config.listener.handshake_timeout_secs = Some(secs);
        }

        if let Some(path) = self.pem_file {
            config.identity.pem_file = Some(path);
        }
        if let Some(hostname) = self.hostname {
            config.identity.hostname = Some(hostname);
        }

        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.json_logs {
            config.observability.log_format = LogFormat::Json;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cert-echo: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        pem_file = ?config.identity.pem_file,
        "cert-echo starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    match startup::run(config, &shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cert-echo failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<EchoConfig, ConfigError> {
        Cli::try_parse_from(args).unwrap().into_config()
    }

    #[test]
    fn positional_address_and_pem_file() {
        let pem = tempfile::NamedTempFile::new().unwrap();
        let pem_path = pem.path().to_str().unwrap();

        let config = parse(&["cert-echo", "9443", pem_path]).unwrap();
        assert_eq!(config.listener.bind_address, "9443");
        assert_eq!(config.identity.pem_file.as_deref(), Some(pem.path()));
    }

    #[test]
    fn address_is_required_without_config() {
        assert!(Cli::try_parse_from(["cert-echo"]).is_err());
    }

    #[test]
    fn command_line_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:7000\"\nmax_connections = 5\n\n[observability]\nlog_level = \"debug\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["cert-echo", "--config", path, "--max-connections", "9"]).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
        assert_eq!(config.listener.max_connections, 9);
        assert_eq!(config.observability.log_level, "debug");

        let config = parse(&["cert-echo", "8000", "--config", path]).unwrap();
        assert_eq!(config.listener.bind_address, "8000");
    }

    #[test]
    fn handshake_timeout_can_be_disabled() {
        let config = parse(&["cert-echo", "8443", "--no-handshake-timeout"]).unwrap();
        assert_eq!(config.listener.handshake_timeout_secs, None);

        let config = parse(&["cert-echo", "8443", "--handshake-timeout-secs", "3"]).unwrap();
        assert_eq!(config.listener.handshake_timeout_secs, Some(3));
    }

    #[test]
    fn metrics_address_enables_metrics() {
        let config = parse(&["cert-echo", "8443", "--metrics-address", "127.0.0.1:9100"]).unwrap();
        assert!(config.observability.metrics_enabled);
        assert_eq!(config.observability.metrics_address, "127.0.0.1:9100");
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let err = parse(&["cert-echo", "8443", "--max-connections", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
