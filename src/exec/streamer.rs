//! Response streaming.
//!
//! # Responsibilities
//! - Set `Content-Type` and an attachment `Content-Disposition` up front
//! - Drain the command output in bounded chunks
//! - Hand every chunk to the HTTP transport as its own body frame
//!
//! # Design Decisions
//! - The status line is committed optimistically; a failure later in the
//!   pipeline only shortens the body
//! - The body channel holds a single frame, so the transport writes (and
//!   flushes) each chunk before the next read from the pipe

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::exec::error::ExecError;
use crate::exec::spec::ExecutionSpec;

/// Maximum bytes read from the command output per body frame.
pub const CHUNK_SIZE: usize = 500 * 1024;

/// Write side of a streaming response body.
#[derive(Debug)]
pub struct BodySink {
    tx: mpsc::Sender<Bytes>,
}

impl BodySink {
    /// Send one chunk to the client.
    ///
    /// Fails once the response body has been dropped, i.e. the client
    /// disconnected or the transport gave up on the connection.
    pub async fn send(&self, chunk: Bytes) -> Result<(), ExecError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| ExecError::StreamWrite("response body closed by transport".into()))
    }
}

/// Create a connected body sink and axum response body.
pub fn body_channel() -> (BodySink, Body) {
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<Bytes, std::io::Error>(chunk), rx))
    });
    (BodySink { tx }, Body::from_stream(stream))
}

/// Build the streaming response head for `spec` and its body sink.
pub fn streaming_response(spec: &ExecutionSpec) -> (Response<Body>, BodySink) {
    let (sink, body) = body_channel();
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Some(content_type) = &spec.content_type {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(e) => tracing::warn!(content_type = %content_type, error = %e, "Invalid content type, not sent"),
        }
    }
    if !spec.file_name.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&content_disposition(&spec.file_name)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    (response, sink)
}

/// `attachment; filename="<name>"` with the name form-urlencoded.
pub fn content_disposition(file_name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    format!("attachment; filename=\"{}\"", encoded)
}

/// Copy `output` into `sink` until end of stream, a read error, or the
/// client going away. The reader is dropped (closed) on return.
///
/// Returns the number of bytes handed to the transport.
pub async fn serve<R>(mut output: R, sink: BodySink) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut total: u64 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match output.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Source data ends");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Cannot read from output data");
                break;
            }
        };

        if let Err(e) = sink.send(Bytes::copy_from_slice(&buf[..read])).await {
            tracing::error!(error = %e, "Stopping response stream");
            break;
        }
        total += read as u64;
    }

    drop(output);
    tracing::debug!(bytes = total, "Sent data to client");
    total
}
