//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured diagnostic events, stderr)
//!     → metrics.rs (counters, gauges)
//!
//! Handshake hook produces:
//!     → chain_log.rs (one serialized chain line per connection, stdout)
//!
//! Consumers:
//!     → Operator console
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The chain line is the product of the tool, not a diagnostic, so it
//!   bypasses tracing and owns its own lock
//! - Metrics are cheap (atomic increments)

pub mod chain_log;
pub mod logging;
pub mod metrics;

pub use chain_log::ChainLogger;
