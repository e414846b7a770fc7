//! Domain error types.

use thiserror::Error;

/// Classification of a failure as reported back to the command issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Decode, store, transport or hashing fault. Not caused by the caller.
    Internal,
    /// Validation or business-rule failure caused by the request itself.
    User,
}

impl ErrorKind {
    /// Numeric code carried in the `errorCode` field of an acknowledgement.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Internal => 1,
            Self::User => 2,
        }
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request failed input validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// No account matched the supplied filter.
    #[error("user not found")]
    NotFound,

    /// An account with the same account ID or user name is already known.
    #[error("user already exists")]
    AlreadyExists,

    /// The request attempted to change a field that is fixed after creation.
    #[error("{0} cannot be changed")]
    Immutable(&'static str),

    /// The command payload could not be decoded.
    #[error("payload decode error: {0}")]
    Decode(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns whether this error is the caller's fault or ours.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::NotFound | Self::AlreadyExists | Self::Immutable(_) => {
                ErrorKind::User
            }
            Self::Decode(_) | Self::Infrastructure(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `self.kind().code()`.
    #[must_use]
    pub const fn code(&self) -> i16 {
        self.kind().code()
    }
}
