//! Structured per-request logging context.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::Span;

/// Fields identifying one request in every log line it produces.
///
/// Passed explicitly to the coordinator; the runner and streamer tasks are
/// instrumented with [`RequestContext::span`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Listener the request arrived on (`ip:port`).
    pub server: String,
    pub remote_addr: SocketAddr,
    /// Unix seconds at which the request was received.
    pub received_at: u64,
    pub route: String,
    pub request_id: String,
    span: Span,
}

impl RequestContext {
    pub fn new(
        server: impl Into<String>,
        remote_addr: SocketAddr,
        route: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        let server = server.into();
        let route = route.into();
        let request_id = request_id.into();
        let received_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let span = tracing::info_span!(
            "request",
            server = %server,
            remote = %remote_addr,
            ts = received_at,
            route = %route,
            request_id = %request_id,
        );

        Self {
            server,
            remote_addr,
            received_at,
            route,
            request_id,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
