//! Error types for ampctl.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Link-level, protocol-level, and
//! validation errors are all captured here.
//!
//! Malformed read-back replies are deliberately *not* errors: the amplifier
//! line is noisy, so decoders return the [`VOLUME_UNKNOWN`](crate::VOLUME_UNKNOWN)
//! sentinel instead.

/// The error type for all ampctl operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial port could not be opened, written, or read.
    ///
    /// Callers should treat this as "device unavailable" and may retry.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A genuine failure reported by the device (e.g. `Error 2: Unrecognized Command`).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No line arrived within the read timeout.
    ///
    /// The health monitor folds this into the liveness state; command
    /// callers see it as a failed read.
    #[error("timeout waiting for response")]
    Timeout,

    /// The operation is not available on the configured firmware dialect.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A zone, input, or level was out of range. Raised before any I/O.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the amplifier has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the amplifier was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the device is (temporarily) unreachable.
    ///
    /// Validation, dialect, and device-reported protocol errors are not
    /// retryable: sending the same command again would fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connectivity(_)
                | Error::Timeout
                | Error::NotConnected
                | Error::ConnectionLost
                | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
