//! Error type shared by every module of the crate.

use thiserror::Error;

/// Failures raised by diagnostics, transforms and toy distributions.
///
/// All of them are validation failures reported at the call that broke a
/// precondition. Numerical degeneracies are not errors: they surface as
/// sentinel values such as `f64::NEG_INFINITY`.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument violated a documented precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The called capability has no concrete implementation.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// I/O error while reading or writing chain files.
    #[cfg(feature = "csv")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV content.
    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for building an [`Error::InvalidArgument`].
pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidArgument(msg.into()))
}
