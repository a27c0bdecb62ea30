//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, Transaction>,
    last_account_id: AccountId,
    last_transaction_id: TransactionId,
}

impl State {
    fn adjust(&mut self, account_id: AccountId, delta: &BigDecimal) -> LedgerResult<BigDecimal> {
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.balance += delta;
        Ok(account.balance.clone())
    }

    fn insert_transaction(&mut self, record: NewTransaction) -> Transaction {
        self.last_transaction_id += 1;
        let transaction = Transaction {
            id: self.last_transaction_id,
            timestamp: record.timestamp,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            amount: record.amount,
            message: record.message,
            status: record.status,
        };
        self.transactions
            .insert(transaction.id, transaction.clone());
        transaction
    }

    /// Check everything that could fail before touching any state
    fn check_batch(&self, batch: &LedgerBatch) -> LedgerResult<()> {
        for posting in &batch.postings {
            if !self.accounts.contains_key(&posting.account_id) {
                return Err(LedgerError::AccountNotFound(posting.account_id));
            }
        }

        match &batch.write {
            TransactionWrite::Insert(record) => {
                for account_id in [record.sender_id, record.receiver_id] {
                    if !self.accounts.contains_key(&account_id) {
                        return Err(LedgerError::AccountNotFound(account_id));
                    }
                }
            }
            TransactionWrite::Resolve { transaction_id, .. } => {
                let existing = self
                    .transactions
                    .get(transaction_id)
                    .ok_or(LedgerError::TransactionNotFound(*transaction_id))?;
                if existing.status.is_final() {
                    return Err(LedgerError::AlreadyFinal {
                        transaction_id: *transaction_id,
                        status: existing.status,
                    });
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, batch: LedgerBatch) -> LedgerResult<Transaction> {
        self.check_batch(&batch)?;

        for posting in &batch.postings {
            self.adjust(posting.account_id, &posting.delta)?;
        }

        match batch.write {
            TransactionWrite::Insert(record) => Ok(self.insert_transaction(record)),
            TransactionWrite::Resolve {
                transaction_id,
                status,
            } => {
                let transaction = self
                    .transactions
                    .get_mut(&transaction_id)
                    .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
                transaction.status = status;
                Ok(transaction.clone())
            }
        }
    }
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<State>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data and restart id assignment (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write()? = State::default();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn insert_account(&self, account: NewAccount) -> LedgerResult<Account> {
        let mut state = self.write()?;
        state.last_account_id += 1;
        let account = Account {
            id: state.last_account_id,
            name: account.name,
            handle: account.handle,
            balance: account.opening_balance.clone(),
            opening_balance: account.opening_balance,
            created_at: account.created_at,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&account_id).cloned())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.write()?.accounts.remove(&account_id))
    }

    async fn adjust_balance(
        &self,
        account_id: AccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        self.write()?.adjust(account_id, delta)
    }

    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        Ok(self.read()?.transactions.get(&transaction_id).cloned())
    }

    async fn get_account_transactions(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|txn| txn.involves(account_id))
            .cloned()
            .collect())
    }

    async fn get_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.read()?.transactions.values().cloned().collect())
    }

    async fn commit(&self, batch: LedgerBatch) -> LedgerResult<Transaction> {
        self.write()?.apply(batch)
    }
}
