//! Password hashing abstraction.

use crate::error::DomainError;

/// One-way password hashing. Implementations must never return the
/// plaintext, and `verify` must accept every hash produced by `hash`.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `plaintext` into an opaque, salted representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the hashing backend fails.
    fn hash(&self, plaintext: &str) -> Result<String, DomainError>;

    /// Checks `plaintext` against a hash previously produced by `hash`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if `hash` is malformed.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, DomainError>;
}
