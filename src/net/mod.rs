//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (mandatory client certificate handshake)
//!     → verifier.rs (accept any certificate, hand chain to observer)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Accepted → Handshaking → Established → Serving → Closed
//!                            ↘ HandshakeFailed → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Every connection is TLS; a missing client certificate fails the handshake
//! - Certificate content never fails a handshake

pub mod connection;
pub mod listener;
pub mod tls;
pub mod verifier;
