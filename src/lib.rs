//! HTTP gateway that runs configured commands over multipart uploads and
//! streams their output back as the response body.

pub mod config;
pub mod exec;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
