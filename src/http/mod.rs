//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, body limit, read and header timeouts)
//!     → [routing: exact path lookup, 404 on miss]
//!     → [exec: ExecutionSpec from route + query, multipart reader]
//!     → streaming response returned at once, body fed by the pipeline
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer, TransportTimeouts};
