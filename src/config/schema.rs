//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::net::{AddrParseError, IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Root configuration: one entry per listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub servers: Vec<ServerConfig>,
}

/// A listener and the routes it serves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen IP (e.g., "0.0.0.0", "::1").
    #[serde(default = "default_ip")]
    pub ip: String,

    pub port: u16,

    /// Serve HTTPS when present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Upload read timeout in seconds, 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Maximum request body size in bytes, 0 for unlimited.
    #[serde(default)]
    pub max_body_size: usize,

    /// Routes in declaration order; first matching path wins.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: 8080,
            tls: None,
            timeout_secs: 0,
            max_body_size: 0,
            routes: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.ip.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// `ip:port` label used in logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A path served by running a command over selected upload fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Exact request path (e.g., "/convert").
    pub path: String,

    /// Multipart field names forwarded to the command, concatenated in
    /// arrival order.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Response `Content-Type`.
    #[serde(default)]
    pub content_type: Option<String>,

    pub command: CommandConfig,
}

/// How and as whom the command runs.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CommandConfig {
    /// Program path, or script text when `shell` is set.
    pub command: String,

    /// Arguments for direct execution.
    pub params: Vec<String>,

    /// Interpreter run as `<shell> -c <command>`; empty for direct exec.
    pub shell: String,

    /// Account to run as; empty keeps the gateway's effective user.
    pub user: String,

    /// Group to run as; empty keeps the gateway's effective group.
    pub group: String,

    /// New filesystem root for the command; empty for none.
    pub chroot: String,
}
