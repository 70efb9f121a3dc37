//! Errors returned by the admin command layer

use std::{io, time::Duration};

use thiserror::Error;

use crate::generic_command::{CommandStatusCode, CompletionStatus};

/// Result type used throughout this crate
pub type Result<T, E = AdminError> = core::result::Result<T, E>;

/// Error taxonomy of the admin command layer
///
/// Nothing in this crate retries on error, that is up to the caller.
#[derive(Debug, Error)]
pub enum AdminError {
    /// A command could not be encoded from the given parameters
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// name of the offending parameter
        name: &'static str,
        /// why the value was rejected
        reason: String,
    },

    /// The transport exited with a non-zero status and printed nothing that
    /// could be parsed as a completion
    #[error("`{command_line}` failed with exit code {exit_code:?}: {stderr}")]
    TransportFailure {
        /// the full command line handed to the transport
        command_line: String,
        /// process exit code, `None` if it was killed by a signal
        exit_code: Option<i32>,
        /// captured stderr
        stderr: String,
    },

    /// The transport did not finish within the timeout
    #[error("`{command_line}` timed out after {timeout:?}")]
    Timeout {
        /// the full command line handed to the transport
        command_line: String,
        /// the timeout that was exceeded
        timeout: Duration,
    },

    /// The payload was too short or contained no hex-dump lines
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The controller completed the command with a non-success status
    #[error("command completed with error: {status}")]
    Status {
        /// the interpreted status code
        status: CommandStatusCode,
        /// the full completion
        completion: Box<CompletionStatus>,
    },

    /// Local I/O failed, e.g. spawning the transport process
    #[error("{context}")]
    Io {
        /// what was being done
        context: String,
        /// the underlying error
        #[source]
        source: io::Error,
    },
}

impl AdminError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AdminError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        AdminError::Io {
            context: context.into(),
            source,
        }
    }
}
