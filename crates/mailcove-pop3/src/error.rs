//! Error types for the POP3 server engine.

use std::io;
use std::time::Duration;

use crate::backend::BackendError;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the protocol engine.
///
/// Every variant here is fatal to its session: the engine writes at most one
/// `-ERR` diagnostic line and closes the connection. Recoverable conditions
/// (a rejected login, an unknown verb, a missing message) are answered with a
/// soft `-ERR` reply on the wire and never surface as an [`Error`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the client connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The verb is not legal in the session's current phase.
    #[error("invalid state")]
    InvalidState,

    /// Wrong number of positional arguments for the verb.
    #[error("invalid argument count")]
    InvalidArgsCount,

    /// An argument failed to parse as a message number.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend refused to grant the exclusive maildrop lock.
    #[error("unable to lock maildrop")]
    UnableToLock(#[source] BackendError),

    /// The backend failed to release the maildrop lock.
    #[error("unable to unlock maildrop")]
    UnableToUnlock(#[source] BackendError),

    /// Committing pending deletions failed during QUIT.
    #[error("update operation failed")]
    UpdateFailed(#[source] BackendError),

    /// A backend operation failed on a verb whose failure cannot be reported
    /// and recovered in-session.
    #[error("backend operation failed")]
    Backend(#[source] BackendError),

    /// The client sent a request line longer than the engine accepts.
    #[error("request line too long")]
    LineTooLong,

    /// The connection sat idle past the configured timeout.
    #[error("connection idle for {0:?}")]
    Timeout(Duration),

    /// TLS listening was requested without a TLS configuration.
    #[error("no TLS configuration supplied")]
    MissingTlsConfig,
}

impl Error {
    /// Returns true if the session died from the transport rather than a
    /// protocol or backend failure.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::LineTooLong)
    }
}
