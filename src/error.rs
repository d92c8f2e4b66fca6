//! Crate error types.

use std::net::Ipv4Addr;

/// Top level error returned from drive and controller operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A request/response round trip to a drive timed out after exhausting
    /// all retry attempts.
    Timeout {
        /// The drive that failed to respond.
        drive: String,
        /// Total attempts made before giving up.
        attempts: u32,
    },
    /// The drive reported a nonzero `error_code`.
    Drive(DriveError),
    /// A response could not be decoded.
    Codec(CodecError),
    /// A caller asked for a monitoring-channel value that is not configured
    /// on the drive.
    MonitoringChannelMissingParameter {
        /// The drive that was queried.
        drive: String,
        /// The parameter description that was expected but absent.
        parameter: &'static str,
    },
    /// A caller-supplied argument violates an operation's precondition
    /// (e.g. a signed velocity passed to `go_to_pos`).
    InvalidArgument(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Timeout { drive, attempts } => {
                write!(f, "'{drive}' did not respond after {attempts} attempt(s)")
            }
            Error::Drive(e) => write!(f, "{e}"),
            Error::Codec(e) => write!(f, "{e}"),
            Error::MonitoringChannelMissingParameter { drive, parameter } => write!(
                f,
                "monitoring channel on '{drive}' has no '{parameter}' parameter configured"
            ),
            Error::InvalidArgument(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<DriveError> for Error {
    fn from(e: DriveError) -> Self {
        Error::Drive(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

/// A nonzero `error_code` reported by a drive.
///
/// Raising this sets the drive's `awaiting_error_acknowledgement` flag; all
/// guarded operations become no-ops until [`Drive::acknowledge_error`] is
/// called (see the type's docs for the exact handshake).
///
/// [`Drive::acknowledge_error`]: crate::drive::Drive::acknowledge_error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveError {
    /// The drive's reported error code.
    pub code: u16,
    /// The drive's configured address, identifying which axis raised it.
    pub drive: Ipv4Addr,
}

impl core::fmt::Display for DriveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "error code {} raised by drive {}", self.code, self.drive)
    }
}

impl std::error::Error for DriveError {}

/// A malformed or inconsistent response from a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The received buffer was shorter than the response descriptor
    /// requires.
    LengthMismatch {
        /// Bytes required by the descriptor.
        expected_at_least: usize,
        /// Bytes actually received.
        got: usize,
    },
    /// A field carried a value outside its expected range (e.g. an unknown
    /// realtime-config status byte).
    InvalidStatus {
        /// The offending raw byte/word.
        value: u32,
    },
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CodecError::LengthMismatch {
                expected_at_least,
                got,
            } => write!(
                f,
                "response buffer too short: need at least {expected_at_least} bytes, got {got}"
            ),
            CodecError::InvalidStatus { value } => {
                write!(f, "unexpected status value {value:#x}")
            }
        }
    }
}

impl std::error::Error for CodecError {}
