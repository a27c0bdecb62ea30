//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::types::*;

/// Storage abstraction for the ledger system
///
/// This trait allows the ledger to work with any storage backend (SQLite,
/// PostgreSQL, in-memory, etc.). Implementations use interior mutability so a
/// single handle can be shared by concurrent callers.
///
/// Backends assign account and transaction ids in increasing order.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Insert a new account and return it with its assigned id
    async fn insert_account(&self, account: NewAccount) -> LedgerResult<Account>;

    /// Get an account by ID
    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>>;

    /// List all accounts ordered by id
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;

    /// Remove an account, returning the removed record if it existed
    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>>;

    /// Atomically apply `balance += delta` and return the new balance
    ///
    /// No sign policy is enforced here.
    async fn adjust_balance(
        &self,
        account_id: AccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<BigDecimal>;

    /// Get a transaction by ID
    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<Transaction>>;

    /// List transactions sent or received by an account, in creation order
    async fn get_account_transactions(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>>;

    /// List all transactions in creation order
    async fn get_transactions(&self) -> LedgerResult<Vec<Transaction>>;

    /// Apply every posting and the record write as one unit
    ///
    /// Either all of the batch becomes visible or none of it does. A
    /// `TransactionWrite::Resolve` against a record that is no longer pending
    /// fails with `LedgerError::AlreadyFinal`.
    async fn commit(&self, batch: LedgerBatch) -> LedgerResult<Transaction>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before it is opened
    fn validate_account(&self, account: &NewAccount) -> LedgerResult<()>;

    /// Validate account deletion
    fn validate_account_deletion(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom transfer validation rules
pub trait TransferValidator: Send + Sync {
    /// Validate a transfer before it is recorded
    fn validate_transfer(&self, transfer: &NewTransfer) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &NewAccount) -> LedgerResult<()> {
        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        if account.handle.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account handle cannot be empty".to_string(),
            ));
        }

        if account.opening_balance < BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Opening balance cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_account_deletion(&self, _account: &Account) -> LedgerResult<()> {
        Ok(())
    }
}

/// Default transfer validator: positive amount and a message
pub struct DefaultTransferValidator;

impl TransferValidator for DefaultTransferValidator {
    fn validate_transfer(&self, transfer: &NewTransfer) -> LedgerResult<()> {
        if transfer.amount <= BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Transfer amount must be positive".to_string(),
            ));
        }

        if transfer.message.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Transfer message cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
