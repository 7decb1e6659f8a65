//! Error types shared across the acquisition, DSP, and RPC layers.

use std::fmt;
use std::io;

/// Common error type for the pipeline and its surrounding workers.
#[derive(Debug)]
pub enum PressmatError {
    /// No byte arrived from the serial source within the configured timeout.
    SerialTimeout,
    /// The file source reached the end of its last configured file.
    FileEnd,
    /// A decoded frame had the wrong length or an unrecognized escape byte.
    InvalidFrame(String),
    /// Malformed YAML or a numeric expression that failed to evaluate.
    ConfigError(String),
    /// A recording file failed to open or write.
    RecordIoError(io::Error),
    /// `sendto`/`recvfrom` failed with ECONNRESET or ENOENT.
    ClientOffline,
    /// Any other I/O failure.
    Io(io::Error),
}

impl fmt::Display for PressmatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressmatError::SerialTimeout => write!(f, "Serial connection timeout!"),
            PressmatError::FileEnd => write!(f, "End of file."),
            PressmatError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            PressmatError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            PressmatError::RecordIoError(err) => write!(f, "Record I/O error: {}", err),
            PressmatError::ClientOffline => write!(f, "client off-line"),
            PressmatError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PressmatError {}

impl From<io::Error> for PressmatError {
    fn from(err: io::Error) -> Self {
        PressmatError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, PressmatError>;
