//! Test projection stores — in-memory `ProjectionStore` implementations.

use std::sync::Mutex;

use accounts_core::account::{Account, PartialAccount};
use accounts_core::store::{AccountFilter, ProjectionStore, StoreError};
use async_trait::async_trait;

/// A projection store backed by a `Vec`, enforcing the same unique
/// constraints (account ID, user name) as the real one. Records keep their
/// insertion order, so `find_one` returns the oldest match.
#[derive(Debug, Default)]
pub struct InMemoryProjectionStore {
    accounts: Mutex<Vec<Account>>,
}

impl InMemoryProjectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`.
    #[must_use]
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
        }
    }

    /// Returns a snapshot of every stored account.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn find_one(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().find(|a| filter.matches(a)).cloned())
    }

    async fn find(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().filter(|a| filter.matches(a)).cloned().collect())
    }

    async fn insert_one(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(existing) = accounts
            .iter()
            .find(|a| a.account_id == account.account_id || a.user_name == account.user_name)
        {
            return Err(StoreError::Duplicate(format!(
                "account {} / {} already stored",
                existing.account_id, existing.user_name
            )));
        }
        accounts.push(account.clone());
        Ok(())
    }

    async fn update_many(
        &self,
        filter: &AccountFilter,
        update: &PartialAccount,
    ) -> Result<u64, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        let mut matched = 0;
        for account in accounts.iter_mut().filter(|a| filter.matches(a)) {
            *account = account.patched(update);
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete_many(&self, filter: &AccountFilter) -> Result<u64, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        let before = accounts.len();
        accounts.retain(|a| !filter.matches(a));
        Ok((before - accounts.len()) as u64)
    }
}

/// A projection store whose every operation fails with a backend error.
#[derive(Debug)]
pub struct FailingProjectionStore;

fn backend_down() -> StoreError {
    StoreError::Backend("connection refused".into())
}

#[async_trait]
impl ProjectionStore for FailingProjectionStore {
    async fn find_one(&self, _filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        Err(backend_down())
    }

    async fn find(&self, _filter: &AccountFilter) -> Result<Vec<Account>, StoreError> {
        Err(backend_down())
    }

    async fn insert_one(&self, _account: &Account) -> Result<(), StoreError> {
        Err(backend_down())
    }

    async fn update_many(
        &self,
        _filter: &AccountFilter,
        _update: &PartialAccount,
    ) -> Result<u64, StoreError> {
        Err(backend_down())
    }

    async fn delete_many(&self, _filter: &AccountFilter) -> Result<u64, StoreError> {
        Err(backend_down())
    }
}
