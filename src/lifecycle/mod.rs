//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse CLI → Init logging → Load config → Start one server per listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: config errors and bind failures are fatal
//! - Shutdown has a deadline: forced exit after the grace period, running
//!   commands are not killed

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
