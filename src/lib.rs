//! Diagnostic mutual-TLS endpoint.
//!
//! Accepts TLS connections, requires a client certificate without validating
//! it, prints the presented chain and answers HTTP requests with `OK`.

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::EchoConfig;
pub use error::Error;
pub use http::EchoServer;
pub use identity::{provision, IdentitySource, ServerIdentity};
pub use lifecycle::Shutdown;
pub use observability::ChainLogger;
