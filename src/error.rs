//! Custom error types for the gateway.
//!
//! Two error enums live here, both built with `thiserror`:
//!
//! - **`AcquisitionError`**: the terminal outcome of a single instrument read. Every variant
//!   corresponds to one failure kind a caller can act on (re-issue the request, check the
//!   cabling, steady the sample on the scale, ...). The core never retries on its own, so
//!   these errors travel unchanged from the device layer up to the HTTP gateway, which maps
//!   them to status codes.
//! - **`GatewayError`**: process-level failures such as configuration loading and validation,
//!   plus I/O errors while binding the server.
//!
//! `AcquisitionError` is `Clone + PartialEq` so outcomes can be compared directly in tests.

use thiserror::Error;

/// Convenience alias for results using the process-level error type.
pub type AppResult<T> = std::result::Result<T, GatewayError>;

/// Failure of one acquisition against an instrument.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// Transport-level failure opening or using the serial port or a TCP socket.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The deadline elapsed before the device delivered enough data.
    #[error("Timeout: {0}")]
    AcquisitionTimeout(String),

    /// Fewer scale samples than required fell inside the plausible weight range.
    #[error(
        "Readings are outside the valid range ({min} - {max} g): {in_range} of {required} in range"
    )]
    OutOfRange {
        /// Samples inside the range.
        in_range: usize,
        /// Samples that had to be inside it.
        required: usize,
        /// Lower bound, exclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },

    /// Scale samples did not agree closely enough with the first reading.
    #[error(
        "Insufficient consistency in the readings: {agreeing} of {required} within {tolerance_pct}% of {reference}"
    )]
    Unstable {
        /// First in-range reading.
        reference: f64,
        /// Readings within the band, the reference included.
        agreeing: usize,
        /// Readings that had to agree.
        required: usize,
        /// Band half-width as a percentage of the reference.
        tolerance_pct: f64,
    },

    /// No valid number could be extracted from the device text.
    #[error("Could not extract a valid number from: {0}")]
    ParseError(String),

    /// The operator aborted the measurement at the instrument.
    #[error("Reading cancelled by the user")]
    CancelledByUser,
}

/// Discriminant of [`AcquisitionError`], used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`AcquisitionError::ConnectionError`].
    Connection,
    /// See [`AcquisitionError::AcquisitionTimeout`].
    Timeout,
    /// See [`AcquisitionError::OutOfRange`].
    OutOfRange,
    /// See [`AcquisitionError::Unstable`].
    Unstable,
    /// See [`AcquisitionError::ParseError`].
    Parse,
    /// See [`AcquisitionError::CancelledByUser`].
    Cancelled,
}

impl AcquisitionError {
    /// Build a [`AcquisitionError::ConnectionError`] from any displayable cause.
    pub fn connection(context: &str, cause: impl std::fmt::Display) -> Self {
        Self::ConnectionError(format!("{context}: {cause}"))
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionError(_) => ErrorKind::Connection,
            Self::AcquisitionTimeout(_) => ErrorKind::Timeout,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::Unstable { .. } => ErrorKind::Unstable,
            Self::ParseError(_) => ErrorKind::Parse,
            Self::CancelledByUser => ErrorKind::Cancelled,
        }
    }

    /// Whether the failure came from validating data the device did deliver.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::OutOfRange | ErrorKind::Unstable | ErrorKind::Parse | ErrorKind::Cancelled
        )
    }
}

/// Process-level errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A loaded value failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Binding the listener or another process-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An acquisition failure surfaced outside the HTTP layer.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

impl From<figment::Error> for GatewayError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
