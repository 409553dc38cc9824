//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM
//! - Report which one arrived so startup code can trigger shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - No reload signal: configuration is fixed for the process lifetime

use std::future::Future;

use tokio::signal::unix::{signal, SignalKind};

/// Wait until the process is asked to terminate.
///
/// Returns the name of the signal received.
pub async fn termination() -> Result<&'static str, std::io::Error> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    tracing::info!(signal = name, "Signal received");
    Ok(name)
}

/// Reason reported when signal handlers could not be installed.
pub const SIGNAL_SETUP_FAILED: &str = "signal setup failed";

/// Await `signal` and turn a setup failure into a logged shutdown reason,
/// so callers always proceed to their shutdown path.
pub async fn stop_reason<F>(signal: F) -> &'static str
where
    F: Future<Output = Result<&'static str, std::io::Error>>,
{
    match signal.await {
        Ok(name) => name,
        Err(e) => {
            tracing::error!(error = %e, "Cannot listen for signals, shutting down");
            SIGNAL_SETUP_FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn setup_failure_still_yields_a_reason() {
        let failing = async { Err(std::io::Error::other("no signal driver")) };
        assert_eq!(stop_reason(failing).await, SIGNAL_SETUP_FAILED);
    }

    #[tokio::test]
    async fn received_signal_is_passed_through() {
        assert_eq!(stop_reason(async { Ok("SIGTERM") }).await, "SIGTERM");
    }
}
