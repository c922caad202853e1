//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Established mTLS connection
//!     → server.rs (hyper auto: HTTP/1.1 or HTTP/2)
//!     → handler.rs (200 "OK" for any GET)
//!     → Send to client
//! ```

pub mod handler;
pub mod server;

pub use server::EchoServer;
