//! Account management functionality

use bigdecimal::BigDecimal;
use std::sync::Arc;
use std::time::Duration;

use crate::ledger::locks::AccountLocks;
use crate::traits::*;
use crate::types::*;

/// Account manager for opening, reading and closing accounts
pub struct AccountManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
    locks: Arc<AccountLocks>,
    lock_timeout: Duration,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S, locks: Arc<AccountLocks>, lock_timeout: Duration) -> Self {
        Self::with_validator(storage, Box::new(DefaultAccountValidator), locks, lock_timeout)
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(
        storage: S,
        validator: Box<dyn AccountValidator>,
        locks: Arc<AccountLocks>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            validator,
            locks,
            lock_timeout,
        }
    }

    /// Open a new account; the balance defaults to zero
    pub async fn create_account(
        &self,
        name: String,
        handle: String,
        opening_balance: Option<BigDecimal>,
    ) -> LedgerResult<Account> {
        let draft = NewAccount::new(
            name,
            handle,
            opening_balance.unwrap_or_else(|| BigDecimal::from(0)),
        );

        self.validator.validate_account(&draft)?;

        let account = self.storage.insert_account(draft).await?;
        tracing::info!(
            account_id = account.id,
            handle = %account.handle,
            opening_balance = %account.opening_balance,
            "account created"
        );

        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// List all accounts ordered by id
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts().await
    }

    /// Delete an account, returning the removed record
    ///
    /// Waits for in-flight transfers touching the account to finish first.
    pub async fn delete_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        let guard = self.locks.acquire(&[account_id], self.lock_timeout).await?;

        let account = self.get_account_required(account_id).await?;
        self.validator.validate_account_deletion(&account)?;

        let removed = self
            .storage
            .delete_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        drop(guard);
        self.locks.forget(account_id)?;

        tracing::info!(account_id, balance = %removed.balance, "account deleted");
        Ok(removed)
    }

    /// Sum of all account balances
    pub async fn total_balance(&self) -> LedgerResult<BigDecimal> {
        let accounts = self.list_accounts().await?;
        Ok(accounts.iter().map(|account| &account.balance).sum())
    }
}
