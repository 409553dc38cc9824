//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listen addresses and detect listeners sharing one
//! - Check routes are runnable (absolute path, command, fields)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Duplicate route paths are allowed; the first one wins at lookup

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoServers,
    InvalidAddress { server: String, reason: String },
    ZeroPort { server: String },
    DuplicateListener { server: String },
    EmptyTlsPath { server: String },
    RelativePath { server: String, path: String },
    EmptyCommand { server: String, path: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoServers => write!(f, "no servers configured"),
            ValidationError::InvalidAddress { server, reason } => {
                write!(f, "server {}: invalid address: {}", server, reason)
            }
            ValidationError::ZeroPort { server } => write!(f, "server {}: port must not be 0", server),
            ValidationError::DuplicateListener { server } => {
                write!(f, "server {}: address configured more than once", server)
            }
            ValidationError::EmptyTlsPath { server } => {
                write!(f, "server {}: tls requires both cert_path and key_path", server)
            }
            ValidationError::RelativePath { server, path } => {
                write!(f, "server {}: route path \"{}\" must start with '/'", server, path)
            }
            ValidationError::EmptyCommand { server, path } => {
                write!(f, "server {}: route \"{}\" has no command", server, path)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut listeners = HashSet::new();
    for server in &config.servers {
        let label = server.label();

        match server.socket_addr() {
            Ok(addr) => {
                if !listeners.insert(addr) {
                    errors.push(ValidationError::DuplicateListener { server: label.clone() });
                }
            }
            Err(e) => errors.push(ValidationError::InvalidAddress {
                server: label.clone(),
                reason: e.to_string(),
            }),
        }

        if server.port == 0 {
            errors.push(ValidationError::ZeroPort { server: label.clone() });
        }

        if let Some(tls) = &server.tls {
            if tls.cert_path.is_empty() || tls.key_path.is_empty() {
                errors.push(ValidationError::EmptyTlsPath { server: label.clone() });
            }
        }

        for route in &server.routes {
            if !route.path.starts_with('/') {
                errors.push(ValidationError::RelativePath {
                    server: label.clone(),
                    path: route.path.clone(),
                });
            }
            if route.command.command.trim().is_empty() {
                errors.push(ValidationError::EmptyCommand {
                    server: label.clone(),
                    path: route.path.clone(),
                });
            }
            if route.fields.is_empty() {
                tracing::warn!(
                    server = %label,
                    path = %route.path,
                    "Route accepts no fields, its command always reads empty input"
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
