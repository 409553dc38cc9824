//! Streaming execution pipeline.
//!
//! # Data Flow
//! ```text
//! multipart body
//!     → coordinator.rs (drain accepted fields, in arrival order)
//!     → pipe.rs (input pipe)
//!     → runner.rs (external command, identity.rs credentials + chroot)
//!     → pipe.rs (output pipe)
//!     → streamer.rs (chunked response body)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Three concurrent activities per request: drain, runner, streamer
//! - Ordering only through pipe EOF; no locks, pipe ends are moved, not shared
//! - Only upload errors fail a request; command-side errors degrade to an
//!   empty or short body

pub mod context;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod pipe;
pub mod runner;
pub mod spec;
pub mod streamer;

pub use context::RequestContext;
pub use coordinator::{handle, open_multipart, RequestOutcome};
pub use error::ExecError;
pub use identity::{resolve, ResolvedIdentity};
pub use pipe::PipeBridge;
pub use runner::SpawnConfig;
pub use spec::{ExecutionSpec, DEFAULT_FILE_NAME};
pub use streamer::{streaming_response, BodySink};
