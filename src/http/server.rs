//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the execution handler
//! - Wire up middleware (tracing, request ID, body limit, read timeout)
//! - Bind server to a plain or TLS listener
//! - Bound slow or idle clients with transport timeouts
//! - Dispatch requests to the route table
//! - Start the execution pipeline and return its streaming response

use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::RequestBodyTimeoutLayer,
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::exec::{self, ExecutionSpec, RequestContext};
use crate::net::tls::load_tls_config;
use crate::routing::RouteTable;

/// How long a listener waits for open connections after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Connection-level timers applied to every listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Time allowed for a complete request head. On HTTP/1 the timer also
    /// runs while a kept-alive connection waits for its next request.
    pub header_read: Duration,
    /// HTTP/2 ping interval; a peer that stops answering is dropped.
    pub idle: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            header_read: Duration::from_secs(10),
            idle: Duration::from_secs(60),
        }
    }
}

impl TransportTimeouts {
    fn apply(&self, builder: &mut Builder<TokioExecutor>) {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read);
        builder
            .http2()
            .timer(TokioTimer::new())
            .keep_alive_interval(self.idle);
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    /// `ip:port` of the listener, for log context.
    pub server: Arc<str>,
}

/// HTTP server for one configured listener.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    timeouts: TransportTimeouts,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState {
            routes: Arc::new(RouteTable::new(config.routes.clone())),
            server: Arc::from(config.label()),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            timeouts: TransportTimeouts::default(),
        }
    }

    /// Replace the default transport timeouts.
    pub fn with_timeouts(mut self, timeouts: TransportTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let body_limit = if config.max_body_size == 0 {
            DefaultBodyLimit::disable()
        } else {
            DefaultBodyLimit::max(config.max_body_size)
        };

        let router = Router::new()
            .fallback(exec_handler)
            .with_state(state)
            .layer(body_limit);

        let router = if config.timeout_secs > 0 {
            router.layer(RequestBodyTimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
        } else {
            router
        };

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, without connection info.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind according to the config (plain or TLS) and serve until shutdown.
    pub async fn start(self, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        match self.config.tls.clone() {
            Some(tls) => {
                let rustls = load_tls_config(&tls).await?;
                self.run_tls(rustls, shutdown).await
            }
            None => {
                let addr = self
                    .config
                    .socket_addr()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                let listener = TcpListener::bind(addr).await?;
                self.run(listener, shutdown).await
            }
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "Starting plaintext server"
        );

        let mut server =
            axum_server::from_tcp(listener.into_std()?).handle(shutdown_handle(shutdown));
        self.timeouts.apply(server.http_builder());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        server.serve(app).await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }

    /// Run an HTTPS server on the configured address.
    pub async fn run_tls(
        self,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "Starting TLS server"
        );

        let mut server =
            axum_server::bind_rustls(addr, tls).handle(shutdown_handle(shutdown));
        self.timeouts.apply(server.http_builder());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        server.serve(app).await?;

        tracing::info!(address = %addr, "HTTPS server stopped");
        Ok(())
    }
}

/// Handle that starts a bounded graceful shutdown once `shutdown` fires.
fn shutdown_handle(mut shutdown: broadcast::Receiver<()>) -> axum_server::Handle {
    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        trigger.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });
    handle
}

/// Execution handler for every path and method.
async fn exec_handler(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let path = request.uri().path().to_string();

    let ctx = RequestContext::new(state.server.as_ref(), remote_addr, path, request_id);
    let span = ctx.span().clone();
    dispatch(state, ctx, request).instrument(span).await
}

async fn dispatch(state: AppState, ctx: RequestContext, request: Request<Body>) -> Response {
    tracing::info!(method = %request.method(), uri = %request.uri(), "Incoming request");

    let route = match state.routes.lookup(&ctx.route) {
        Some(route) => route,
        None => {
            tracing::warn!("No route matched");
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }
    };

    tracing::info!(
        fields = ?route.fields,
        command = %route.command.command.trim(),
        "Matched route"
    );
    let spec = ExecutionSpec::from_route(route, request.uri().query());

    let multipart = match exec::open_multipart(request).await {
        Ok(multipart) => multipart,
        Err(e) => {
            tracing::error!(error = %e, "Processor finished with error");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let (response, sink) = exec::streaming_response(&spec);

    let span = ctx.span().clone();
    tokio::spawn(
        async move {
            let outcome = exec::handle(spec, multipart, sink, ctx).await;
            if outcome.success {
                tracing::info!("Processor finished successfully");
            } else {
                tracing::warn!("Processor finished with error");
            }
        }
        .instrument(span),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommandConfig, RouteConfig};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::header;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    const BOUNDARY: &str = "server-test-boundary";

    fn config(max_body_size: usize) -> ServerConfig {
        ServerConfig {
            ip: "127.0.0.1".into(),
            port: 0,
            max_body_size,
            routes: vec![RouteConfig {
                path: "/cat".into(),
                fields: vec!["file".into()],
                content_type: Some("text/plain".into()),
                command: CommandConfig {
                    command: "cat".into(),
                    ..CommandConfig::default()
                },
            }],
            ..ServerConfig::default()
        }
    }

    fn app(max_body_size: usize) -> Router {
        HttpServer::new(config(max_body_size))
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    fn upload(uri: &str, field: &str, data: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"in.txt\"\r\nContent-Type: text/plain\r\n\r\n{d}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = field,
            d = data
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn streams_command_output_with_headers() {
        let response = app(0)
            .oneshot(upload("/cat?filename=out.txt", "file", "hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"out.txt\""
        );
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = app(0).oneshot(upload("/nope", "file", "x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_multipart_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/cat")
            .body(Body::from("plain"))
            .unwrap();
        let response = app(0).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_yields_short_body() {
        let data = "x".repeat(4096);
        let response = app(1024).oneshot(upload("/cat", "file", &data)).await.unwrap();

        // Headers are committed before the limit is hit; the body stays short.
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.len() < data.len());
    }

    #[tokio::test]
    async fn incomplete_request_head_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = HttpServer::new(config(0)).with_timeouts(TransportTimeouts {
            header_read: Duration::from_millis(200),
            idle: Duration::from_secs(60),
        });
        tokio::spawn(server.run(listener, shutdown_rx));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"POST /cat HTTP/1.1\r\nHost: localhost\r\n")
            .await
            .unwrap();

        // The server closes the connection (possibly after a 408) instead of
        // waiting for the rest of the head.
        let mut buf = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
        assert!(closed.is_ok(), "connection still open after header timeout");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn idle_keep_alive_connection_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = HttpServer::new(config(0)).with_timeouts(TransportTimeouts {
            header_read: Duration::from_millis(200),
            idle: Duration::from_secs(60),
        });
        tokio::spawn(server.run(listener, shutdown_rx));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /nope HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut buf = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
        assert!(closed.is_ok(), "idle connection kept open");
        assert!(String::from_utf8_lossy(&buf).starts_with("HTTP/1.1 404"));

        let _ = shutdown_tx.send(());
    }
}
