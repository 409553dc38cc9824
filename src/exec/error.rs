//! Error taxonomy of the execution pipeline.

use thiserror::Error;

/// Errors raised while executing a route.
///
/// Only [`ExecError::MultipartRead`], [`ExecError::FieldCopy`] and
/// [`ExecError::Pipe`] fail a request outcome. Identity, launch, run and
/// stream errors are logged where they happen and degrade to a short or
/// empty response.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Body is not multipart, is malformed, truncated or timed out.
    #[error("cannot read multipart body: {0}")]
    MultipartRead(String),

    /// I/O failure while relaying an accepted part into the command input.
    #[error("cannot copy content of field \"{field}\": {source}")]
    FieldCopy {
        field: String,
        #[source]
        source: std::io::Error,
    },

    /// Unknown user/group name or unusable account id.
    #[error("identity lookup failed: {0}")]
    IdentityLookup(String),

    /// Missing binary, permission denied, chroot or credential failure.
    #[error("cannot start command \"{command}\": {source}")]
    ProcessLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting failed or the command exited unsuccessfully.
    #[error("command \"{command}\" failed: {reason}")]
    ProcessRun { command: String, reason: String },

    /// Client went away or the response transport refused a chunk.
    #[error("unable to write data to client: {0}")]
    StreamWrite(String),

    /// Pipe creation or registration with the runtime failed.
    #[error("cannot set up pipe: {0}")]
    Pipe(#[source] std::io::Error),
}
