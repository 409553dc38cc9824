//! Pipe bridge between the upload, the command and the response.
//!
//! ```text
//! multipart drain ──input_writer══▶ input_reader──▶ command stdin
//! command stdout ──▶ output_writer══▶ output_reader──▶ response body
//! ```
//!
//! Each pipe has exactly one writer and one reader. Closing the writer is the
//! only end-of-stream signal, and every end is an owned handle, so dropping it
//! on any path closes it exactly once.

use std::os::fd::OwnedFd;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tokio::net::unix::pipe;

use crate::exec::error::ExecError;

/// Ends handed to the command: its stdin and stdout.
#[derive(Debug)]
pub struct CommandEnds {
    pub input_reader: OwnedFd,
    pub output_writer: OwnedFd,
}

/// The two unidirectional pipes of one request.
pub struct PipeBridge {
    /// Written by the coordinator with accepted field bytes.
    pub input_writer: pipe::Sender,
    /// Stdio ends for the command runner.
    pub command: CommandEnds,
    /// Drained by the response streamer.
    pub output_reader: pipe::Receiver,
}

impl PipeBridge {
    /// Create both pipes.
    ///
    /// Descriptors are close-on-exec; only the ends explicitly wired as a
    /// child's stdio survive into that child. Must be called from within a
    /// Tokio runtime because the gateway-side ends are registered with it.
    pub fn new() -> Result<Self, ExecError> {
        let (input_reader, input_writer) = os_pipe()?;
        let (output_reader, output_writer) = os_pipe()?;

        let input_writer = pipe::Sender::from_owned_fd(input_writer).map_err(ExecError::Pipe)?;
        let output_reader =
            pipe::Receiver::from_owned_fd(output_reader).map_err(ExecError::Pipe)?;

        Ok(Self {
            input_writer,
            command: CommandEnds {
                input_reader,
                output_writer,
            },
            output_reader,
        })
    }
}

fn os_pipe() -> Result<(OwnedFd, OwnedFd), ExecError> {
    pipe2(OFlag::O_CLOEXEC).map_err(|errno| ExecError::Pipe(errno.into()))
}
