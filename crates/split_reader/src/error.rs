//! Error taxonomy for split readers.
//!
//! Every fatal condition surfaces as a [`ReaderError`]; callers abandon the
//! whole range scan and let the job framework decide whether to reassign it.

use thiserror::Error;

/// Result type alias using [`ReaderError`].
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Failure reported by a [`crate::session::Session`] while executing a statement.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// No coordinator could be reached for the statement.
    #[error("no host available: {0}")]
    NoHostAvailable(String),

    /// Any other driver or server side failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecuteError {
    /// Create a no-host-available error.
    pub fn no_host_available(msg: impl Into<String>) -> Self {
        ExecuteError::NoHostAvailable(msg.into())
    }

    /// Returns `true` when the failure may clear up on its own and the
    /// execution should be attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecuteError::NoHostAvailable(_))
    }
}

/// Fatal reader errors.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Job configuration or table layout cannot support a scan.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Table metadata could not be fetched.
    #[error("fetch table metadata: {0:#}")]
    Metadata(#[source] anyhow::Error),

    /// None of the candidate replicas accepted a connection.
    #[error("could not connect to any replica {candidates:?}: {source:#}")]
    Connection {
        candidates: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    /// Statement execution failed; wraps the last driver error.
    #[error("i/o error after {attempts} attempt(s): {source}")]
    Io {
        attempts: usize,
        #[source]
        source: ExecuteError,
    },

    /// A value could not be serialized with the column's type.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// `next` was called with no row available.
    #[error("split reader exhausted")]
    Exhausted,

    /// `next` was called after the scan failed.
    #[error("split reader aborted after an earlier failure")]
    Aborted,
}

impl ReaderError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        ReaderError::Configuration(msg.into())
    }

    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        ReaderError::Encoding(msg.into())
    }

    /// Returns the number of execution attempts for I/O errors.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            ReaderError::Io { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
