//! Per-account serialization points
//!
//! Every balance-affecting operation holds the locks of all accounts it
//! touches from the balance read until the commit. Locks are always taken in
//! ascending account id order, so two transfers over the same pair of
//! accounts cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::*;

/// Registry of one async mutex per account
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct AccountGuard {
    account_ids: Vec<AccountId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountGuard {
    /// Accounts covered by this guard, in acquisition order
    pub fn account_ids(&self) -> &[AccountId] {
        &self.account_ids
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, account_id: AccountId) -> LedgerResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::Storage("account lock registry poisoned".to_string()))?;
        Ok(locks.entry(account_id).or_default().clone())
    }

    /// Lock every listed account, waiting at most `timeout` for each
    ///
    /// Duplicate ids are locked once. Must be called from within a Tokio
    /// runtime with the time driver enabled.
    pub async fn acquire(
        &self,
        account_ids: &[AccountId],
        timeout: Duration,
    ) -> LedgerResult<AccountGuard> {
        let mut ordered = account_ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for &account_id in &ordered {
            let lock = self.handle(account_id)?;
            let guard = tokio::time::timeout(timeout, lock.lock_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(account_id, "timed out waiting for account lock");
                    LedgerError::LockTimeout(account_id)
                })?;
            guards.push(guard);
        }

        tracing::debug!(accounts = ?ordered, "acquired account locks");
        Ok(AccountGuard {
            account_ids: ordered,
            _guards: guards,
        })
    }

    /// Drop the registry entry of a deleted account
    ///
    /// Ids are never reused, so later callers only ever find the account
    /// missing.
    pub fn forget(&self, account_id: AccountId) -> LedgerResult<()> {
        self.locks
            .lock()
            .map_err(|_| LedgerError::Storage("account lock registry poisoned".to_string()))?
            .remove(&account_id);
        Ok(())
    }
}
