//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! [[servers]] entry
//!     → plain: tokio TcpListener
//!     → tls: tls.rs loads cert/key → axum-server rustls acceptor
//!     → Hand off to HTTP layer
//! ```

pub mod tls;
