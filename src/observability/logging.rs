//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (stderr)
//! - Map the `-d` / `-t` switches onto level, source location and timestamps
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the CLI-derived default filter
//! - Per-request fields come from the request span, not from the formatter

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output options chosen on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Debug level plus source file and line.
    pub debug: bool,
    /// Prefix lines with a timestamp.
    pub show_time: bool,
}

impl LogOptions {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            "webexec=debug,tower_http=debug"
        } else {
            "webexec=info,tower_http=info"
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(options: LogOptions) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| options.default_filter().into());

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(options.debug)
        .with_line_number(options.debug);

    let registry = tracing_subscriber::registry().with(filter);
    if options.show_time {
        registry.with(layer).init();
    } else {
        registry.with(layer.without_time()).init();
    }
}

/// In-memory log sink for tests that assert on emitted events.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    /// Subscriber writing plain-text events into this buffer.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
