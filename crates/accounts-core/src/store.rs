//! Projection store abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::account::{Account, PartialAccount};
use crate::error::DomainError;

/// Errors reported by a projection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("duplicate account: {0}")]
    Duplicate(String),

    /// Connection, query or decoding failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => Self::AlreadyExists,
            StoreError::Backend(_) => Self::Infrastructure(err.to_string()),
        }
    }
}

/// A match predicate over account records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Every supplied field must match.
    Match(PartialAccount),
    /// At least one of the partial accounts must match.
    AnyOf(Vec<PartialAccount>),
}

impl AccountFilter {
    /// Evaluates the predicate against a single record.
    #[must_use]
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            Self::Match(partial) => partial.matches(account),
            Self::AnyOf(partials) => partials.iter().any(|p| p.matches(account)),
        }
    }
}

impl From<PartialAccount> for AccountFilter {
    fn from(partial: PartialAccount) -> Self {
        Self::Match(partial)
    }
}

/// Document operations over the locally replicated account projection.
///
/// Implementations are shared by every in-flight command without external
/// locking; each operation must be atomic on its own.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Returns the first account matching `filter`, if any.
    async fn find_one(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError>;

    /// Returns every account matching `filter`.
    async fn find(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError>;

    /// Inserts a new account. Fails with `StoreError::Duplicate` if the
    /// account ID or user name is already present.
    async fn insert_one(&self, account: &Account) -> Result<(), StoreError>;

    /// Applies the mutable fields of `update` to every matching account and
    /// returns the number of accounts matched.
    async fn update_many(
        &self,
        filter: &AccountFilter,
        update: &PartialAccount,
    ) -> Result<u64, StoreError>;

    /// Deletes every matching account and returns the number removed.
    async fn delete_many(&self, filter: &AccountFilter) -> Result<u64, StoreError>;
}
