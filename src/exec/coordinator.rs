//! Request coordination: upload drain, command run and response stream.
//!
//! # Lifecycle
//! ```text
//! open multipart ─▶ create pipes ─▶ spawn runner ∥ spawn streamer
//!     ─▶ drain accepted parts into input pipe ─▶ close input pipe
//!     ─▶ join runner ─▶ join streamer ─▶ outcome
//! ```
//!
//! # Design Decisions
//! - The input writer is owned by the drain, so it is closed on every exit
//!   path including a malformed body; both activities are always joined
//! - A command that stops reading (exited, never launched) does not fail
//!   the request: the rest of the upload is drained and discarded
//! - No cancellation: a hung command keeps its request open

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::Request;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tracing::Instrument;

use crate::exec::context::RequestContext;
use crate::exec::error::ExecError;
use crate::exec::pipe::PipeBridge;
use crate::exec::runner;
use crate::exec::spec::ExecutionSpec;
use crate::exec::streamer::{self, BodySink};

/// Result of one request, reported to the HTTP layer for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOutcome {
    /// False only when the upload could not be read or relayed.
    pub success: bool,
    /// Accepted parts seen in the upload.
    pub fields_used: u64,
    /// Bytes written into the command's input.
    pub bytes_forwarded: u64,
}

impl RequestOutcome {
    fn failed(stats: DrainStats) -> Self {
        Self {
            success: false,
            fields_used: stats.fields_used,
            bytes_forwarded: stats.bytes_forwarded,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DrainStats {
    fields_used: u64,
    bytes_forwarded: u64,
}

/// Obtain a multipart reader over the request body.
pub async fn open_multipart(request: Request<Body>) -> Result<Multipart, ExecError> {
    Multipart::from_request(request, &())
        .await
        .map_err(|rejection| ExecError::MultipartRead(rejection.body_text()))
}

/// Run the pipeline for one matched request.
///
/// `sink` is the write side of the already prepared streaming response.
pub async fn handle(
    spec: ExecutionSpec,
    multipart: Multipart,
    sink: BodySink,
    ctx: RequestContext,
) -> RequestOutcome {
    let span = ctx.span().clone();
    coordinate(spec, multipart, sink, ctx).instrument(span).await
}

async fn coordinate(
    spec: ExecutionSpec,
    mut multipart: Multipart,
    sink: BodySink,
    ctx: RequestContext,
) -> RequestOutcome {
    let PipeBridge {
        input_writer,
        command,
        output_reader,
    } = match PipeBridge::new() {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "Cannot create pipes");
            return RequestOutcome::default();
        }
    };

    let spec = Arc::new(spec);

    tracing::debug!("Starting command runner");
    let runner_task = {
        let spec = Arc::clone(&spec);
        tokio::spawn(
            async move { runner::run_with_lookup(&spec, command).await }
                .instrument(ctx.span().clone()),
        )
    };

    tracing::debug!("Starting response streamer");
    let streamer_task =
        tokio::spawn(streamer::serve(output_reader, sink).instrument(ctx.span().clone()));

    tracing::debug!("Reading input data");
    let mut stats = DrainStats::default();
    let drained = drain(&spec, &mut multipart, input_writer, &mut stats).await;
    // The input writer was consumed by `drain`; the command now sees EOF.

    tracing::debug!("Waiting for command runner to finish");
    if let Err(e) = runner_task.await {
        tracing::error!(error = %e, "Command runner task failed");
    }
    tracing::debug!("Waiting for response streamer to finish");
    if let Err(e) = streamer_task.await {
        tracing::error!(error = %e, "Response streamer task failed");
    }

    match drained {
        Ok(()) => {
            tracing::info!(
                fields_used = stats.fields_used,
                bytes = stats.bytes_forwarded,
                "Request finished"
            );
            RequestOutcome {
                success: true,
                fields_used: stats.fields_used,
                bytes_forwarded: stats.bytes_forwarded,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Request aborted");
            RequestOutcome::failed(stats)
        }
    }
}

/// Copy accepted parts into `input`, in arrival order, one part at a time.
///
/// `input` is dropped on return, whatever the result.
async fn drain(
    spec: &ExecutionSpec,
    multipart: &mut Multipart,
    mut input: pipe::Sender,
    stats: &mut DrainStats,
) -> Result<(), ExecError> {
    let mut consumer_gone = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ExecError::MultipartRead(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let accepted = spec.accepts(&name);
        if accepted {
            stats.fields_used += 1;
            tracing::debug!(field = %name, "Copying MIME part");
        } else {
            tracing::debug!(field = %name, "Skipping MIME part");
        }

        let mut copied: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ExecError::MultipartRead(e.body_text()))?
        {
            if !accepted || consumer_gone {
                continue;
            }
            match input.write_all(&chunk).await {
                Ok(()) => copied += chunk.len() as u64,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::warn!("Command is not reading input, discarding the rest of the upload");
                    consumer_gone = true;
                }
                Err(source) => return Err(ExecError::FieldCopy { field: name, source }),
            }
        }

        if accepted {
            tracing::debug!(field = %name, bytes = copied, "Copied MIME part");
            stats.bytes_forwarded += copied;
        }
    }

    tracing::debug!(
        fields_used = stats.fields_used,
        bytes = stats.bytes_forwarded,
        "All input read"
    );
    Ok(())
}
