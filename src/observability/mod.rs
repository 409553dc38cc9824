//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → request span (server, remote, ts, route, request_id)
//!
//! Consumers:
//!     → logging.rs fmt layer on stderr
//! ```
//!
//! # Design Decisions
//! - Request context travels as a span, not as a logger hierarchy
//! - Request ID flows from the request-id layer into that span

pub mod logging;

pub use logging::{init_logging, LogOptions};
