//! webexec: run configured commands over HTTP uploads.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────────┐
//!                     │                        WEBEXEC                        │
//!   multipart POST    │  ┌─────────┐   ┌─────────┐   ┌─────────────────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│ routing │──▶│ exec::coordinator   │  │
//!                     │  │ server  │   │  table  │   │ (drain fields)      │  │
//!                     │  └─────────┘   └─────────┘   └──────────┬──────────┘  │
//!                     │                                         │ input pipe  │
//!                     │                                         ▼             │
//!                     │                              ┌─────────────────────┐  │
//!                     │                              │ exec::runner        │──┼──▶ command
//!                     │                              │ (uid/gid, chroot)   │◀─┼─── (stdin/stdout)
//!                     │                              └──────────┬──────────┘  │
//!                     │                                         │ output pipe │
//!   streamed body     │                              ┌──────────▼──────────┐  │
//!   ◀─────────────────┼──────────────────────────────│ exec::streamer      │  │
//!                     │                              └─────────────────────┘  │
//!                     │   config · lifecycle · observability · net (TLS)      │
//!                     └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinSet;

use webexec::config::load_config;
use webexec::http::HttpServer;
use webexec::lifecycle::{signals, Shutdown};
use webexec::observability::{init_logging, LogOptions};

/// How long listeners may drain after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "webexec", version)]
#[command(about = "Stream multipart uploads through configured commands", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "/etc/webexec.toml")]
    config: PathBuf,

    /// Enable debugging outputs
    #[arg(short, long)]
    debug: bool,

    /// Show time in logs
    #[arg(short = 't', long)]
    show_time: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(LogOptions {
        debug: cli.debug,
        show_time: cli.show_time,
    });
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Program starting");

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "Cannot load config");
            std::process::exit(1);
        }
    };

    if cli.check {
        tracing::info!(servers = config.servers.len(), "Configuration is valid");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let mut servers = JoinSet::new();
    for server_config in config.servers {
        let label = server_config.label();
        let server = HttpServer::new(server_config);
        let server_shutdown = shutdown.subscribe();
        servers.spawn(async move { (label, server.start(server_shutdown).await) });
    }

    tokio::select! {
        reason = signals::stop_reason(signals::termination()) => {
            tracing::info!(reason, "Stopping servers");
        }
        Some(joined) = servers.join_next() => {
            match joined {
                Ok((label, Err(e))) => {
                    tracing::error!(server = %label, error = %e, "Cannot run server");
                    shutdown.trigger();
                    std::process::exit(1);
                }
                Ok((label, Ok(()))) => {
                    tracing::warn!(server = %label, "Server stopped unexpectedly");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Server task failed");
                }
            }
        }
    }

    shutdown.trigger();
    let drain = async {
        while let Some(joined) = servers.join_next().await {
            match joined {
                Ok((label, Ok(()))) => tracing::info!(server = %label, "Server closed"),
                Ok((label, Err(e))) => tracing::error!(server = %label, error = %e, "Server closed with error"),
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Requests still in flight after grace period, exiting anyway"
        );
    }

    tracing::info!("Program terminated");
    Ok(())
}
