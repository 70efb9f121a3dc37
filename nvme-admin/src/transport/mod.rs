//! Transport boundary between the admin command layer and a device
//!
//! A [Transport] executes a single [AdminCommand] against a device and hands
//! back the raw process output. It does not interpret that output, this is
//! done by the [status_parser](crate::status_parser).

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{generic_command::AdminCommand, payload::PayloadFormat, Result};

mod nvme_cli;

pub use nvme_cli::*;

/// Default bound on a single command, commands like a format can take minutes
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Path of an NVMe controller character device, e.g. `/dev/nvme0`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicePath(PathBuf);

impl DevicePath {
    /// Create a new device path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// the underlying path
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for DevicePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Raw result of executing a command
///
/// stdout is kept as bytes, binary payloads are not valid utf8. stderr is
/// passed on unchanged (apart from lossy utf8 decoding) and in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOutput {
    /// the full command line, for diagnostics
    pub command_line: String,
    /// captured stdout
    pub stdout: Vec<u8>,
    /// captured stderr
    pub stderr: String,
    /// process exit code, `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl TransportOutput {
    /// `true` if the process exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Something that can execute admin commands against a device
///
/// Implementations must honor `timeout` and fail with
/// [AdminError::Timeout](crate::AdminError::Timeout) if it is exceeded, making
/// sure nothing keeps running in the background. A single transport can be
/// used for any number of commands, but callers must not issue more than one
/// command per device at a time.
pub trait Transport {
    /// How the data buffer is encoded in [TransportOutput::stdout]
    fn payload_format(&self) -> PayloadFormat;

    /// Timeout used when the caller does not specify one
    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Execute `command` against `device`
    fn execute(
        &self,
        command: &AdminCommand,
        device: &DevicePath,
        timeout: Duration,
    ) -> impl Future<Output = Result<TransportOutput>> + Send;
}
