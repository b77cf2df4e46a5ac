//! Error types for mailbox-rpc
//!
//! [`Error`] is what the transport, the mail backend and the job
//! machinery return. [`OperationError`] is what an operation handler
//! returns; the dispatcher turns it into the `errors` list of a reply.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

impl Error {
    /// Whether the failure took the underlying connection down with it.
    ///
    /// Sync jobs stop (state `error`) on these and record anything else
    /// against the unit being processed.
    #[must_use]
    pub const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single RPC operation, as reported to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The request body could not be understood at all.
    #[error("{0}")]
    Protocol(String),

    #[error("Unknown function_to_call: {0}")]
    UnknownOperation(String),

    /// A required argument is missing or has the wrong shape.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Error> for OperationError {
    fn from(err: Error) -> Self {
        match err {
            Error::Unsupported(capability) => Self::Unsupported(capability.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}
