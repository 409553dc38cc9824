//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use webexec::config::{CommandConfig, RouteConfig, ServerConfig};
use webexec::http::HttpServer;
use webexec::lifecycle::Shutdown;

/// Route running `command` directly with `params`.
pub fn direct_route(path: &str, fields: &[&str], command: &str, params: &[&str]) -> RouteConfig {
    RouteConfig {
        path: path.into(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
        content_type: None,
        command: CommandConfig {
            command: command.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            ..CommandConfig::default()
        },
    }
}

/// Route running `script` through `/bin/sh -c`.
pub fn shell_route(path: &str, fields: &[&str], script: &str) -> RouteConfig {
    let mut route = direct_route(path, fields, script, &[]);
    route.command.shell = "/bin/sh".into();
    route
}

/// Start a plaintext gateway on `addr` serving `routes`.
///
/// The returned coordinator stops it when triggered.
pub async fn start_gateway(addr: SocketAddr, routes: Vec<RouteConfig>) -> Shutdown {
    let config = ServerConfig {
        ip: addr.ip().to_string(),
        port: addr.port(),
        routes,
        ..ServerConfig::default()
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
