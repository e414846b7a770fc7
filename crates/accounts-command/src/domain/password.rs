//! bcrypt-backed password hashing.

use accounts_core::error::DomainError;
use accounts_core::password::PasswordHasher;

/// Work factor used in production.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Hashes passwords with bcrypt at a fixed cost.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher with the given work factor (4..=31).
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// The configured work factor.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, DomainError> {
        bcrypt::hash(plaintext, self.cost)
            .map_err(|e| DomainError::Infrastructure(format!("password hashing failed: {e}")))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, DomainError> {
        bcrypt::verify(plaintext, hash)
            .map_err(|e| DomainError::Infrastructure(format!("password verification failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_and_differs_from_plaintext() {
        let hasher = BcryptHasher::new(4);

        let hash = hasher.hash("s3cret").unwrap();

        assert_ne!(hash, "s3cret");
        assert!(hasher.verify("s3cret", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_default_cost_is_ten() {
        assert_eq!(BcryptHasher::default().cost(), DEFAULT_BCRYPT_COST);
    }

    #[test]
    fn test_invalid_cost_surfaces_as_infrastructure_error() {
        let result = BcryptHasher::new(2).hash("s3cret");

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
