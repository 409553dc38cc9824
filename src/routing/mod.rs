//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (exact path lookup)
//!     → Return: matched RouteConfig or NoMatch (404)
//!
//! Route table (at startup):
//!     RouteConfig[] in declaration order
//!     → Freeze as immutable RouteTable per listener
//! ```
//!
//! # Design Decisions
//! - Routes fixed at startup, immutable at runtime
//! - Deterministic: same path always matches same route
//! - First match wins (declaration order)

pub mod router;

pub use router::RouteTable;
