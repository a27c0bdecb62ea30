//! Transfer processing and the pending → accepted/declined lifecycle

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::ledger::locks::AccountLocks;
use crate::traits::*;
use crate::types::*;

/// Transaction manager for creating and resolving transfers
pub struct TransactionManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn TransferValidator>,
    locks: Arc<AccountLocks>,
    config: LedgerConfig,
}

impl<S: LedgerStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S, locks: Arc<AccountLocks>, config: LedgerConfig) -> Self {
        Self::with_validator(storage, Box::new(DefaultTransferValidator), locks, config)
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(
        storage: S,
        validator: Box<dyn TransferValidator>,
        locks: Arc<AccountLocks>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            storage,
            validator,
            locks,
            config,
        }
    }

    fn check_policy(&self, transfer: &NewTransfer) -> LedgerResult<()> {
        if !self.config.allow_self_transfer && transfer.sender_id == transfer.receiver_id {
            return Err(LedgerError::Validation(
                "Sender and receiver must be different accounts".to_string(),
            ));
        }

        if transfer.message.chars().count() > self.config.max_message_len {
            return Err(LedgerError::Validation(format!(
                "Transfer message cannot exceed {} characters",
                self.config.max_message_len
            )));
        }

        Ok(())
    }

    async fn require_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    fn ensure_pending(transaction: &Transaction) -> LedgerResult<()> {
        if transaction.status.is_final() {
            tracing::warn!(
                transaction_id = transaction.id,
                status = %transaction.status,
                "transaction already final"
            );
            return Err(LedgerError::AlreadyFinal {
                transaction_id: transaction.id,
                status: transaction.status,
            });
        }
        Ok(())
    }

    /// Record a new transfer, settling it immediately if requested
    ///
    /// A pending transfer has no balance effect. A settled one moves the
    /// amount and inserts the record in one commit, or fails with
    /// `InsufficientFunds` leaving everything untouched.
    pub async fn create_transaction(&self, transfer: NewTransfer) -> LedgerResult<Transaction> {
        self.validator.validate_transfer(&transfer)?;
        self.check_policy(&transfer)?;

        let _guard = self
            .locks
            .acquire(
                &[transfer.sender_id, transfer.receiver_id],
                self.config.lock_timeout(),
            )
            .await?;

        let sender = self.require_account(transfer.sender_id).await?;
        self.require_account(transfer.receiver_id).await?;

        if !transfer.settle_now {
            let record = transfer.into_record(TransactionStatus::Pending);
            let transaction = self
                .storage
                .commit(LedgerBatch::record_only(TransactionWrite::Insert(record)))
                .await?;
            tracing::debug!(
                transaction_id = transaction.id,
                sender_id = transaction.sender_id,
                receiver_id = transaction.receiver_id,
                amount = %transaction.amount,
                "pending transfer recorded"
            );
            return Ok(transaction);
        }

        let receiver_id = transfer.receiver_id;
        let amount = transfer.amount.clone();
        let write = TransactionWrite::Insert(transfer.into_record(TransactionStatus::Accepted));
        self.settle(&sender, receiver_id, &amount, write).await
    }

    /// Accept or decline a pending transaction
    ///
    /// Acceptance re-checks the sender's balance as it is now, not as it was
    /// when the transfer was requested. A failed acceptance leaves the
    /// transaction pending.
    pub async fn resolve(
        &self,
        transaction_id: TransactionId,
        accept: bool,
    ) -> LedgerResult<Transaction> {
        let transaction = self.get_transaction_required(transaction_id).await?;
        Self::ensure_pending(&transaction)?;

        let _guard = self
            .locks
            .acquire(
                &[transaction.sender_id, transaction.receiver_id],
                self.config.lock_timeout(),
            )
            .await?;

        // Another resolution may have won the race for the locks
        let transaction = self.get_transaction_required(transaction_id).await?;
        Self::ensure_pending(&transaction)?;

        if !accept {
            let declined = self
                .storage
                .commit(LedgerBatch::record_only(TransactionWrite::Resolve {
                    transaction_id,
                    status: TransactionStatus::Declined,
                }))
                .await?;
            tracing::info!(transaction_id, "transfer declined");
            return Ok(declined);
        }

        let sender = self.require_account(transaction.sender_id).await?;
        self.require_account(transaction.receiver_id).await?;

        let write = TransactionWrite::Resolve {
            transaction_id,
            status: TransactionStatus::Accepted,
        };
        self.settle(&sender, transaction.receiver_id, &transaction.amount, write)
            .await
    }

    /// The single path through which money moves
    ///
    /// Callers hold the locks of both accounts and pass a sender snapshot
    /// read under those locks.
    async fn settle(
        &self,
        sender: &Account,
        receiver_id: AccountId,
        amount: &BigDecimal,
        write: TransactionWrite,
    ) -> LedgerResult<Transaction> {
        let settlement_id = Uuid::new_v4();

        if *amount > sender.balance {
            tracing::warn!(
                %settlement_id,
                account_id = sender.id,
                available = %sender.balance,
                requested = %amount,
                "insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                account_id: sender.id,
                available: sender.balance.clone(),
                requested: amount.clone(),
            });
        }

        let batch = LedgerBatch::transfer(sender.id, receiver_id, amount, write);
        let transaction = self.storage.commit(batch).await?;

        tracing::info!(
            %settlement_id,
            transaction_id = transaction.id,
            sender_id = sender.id,
            receiver_id,
            amount = %amount,
            "transfer settled"
        );
        Ok(transaction)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        self.storage.get_transaction(transaction_id).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction_required(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Transaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// Get transactions sent or received by an account, oldest first
    pub async fn get_account_transactions(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage.get_account_transactions(account_id).await
    }

    /// Get all transactions, oldest first
    pub async fn get_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        self.storage.get_transactions().await
    }
}

/// Common transfer patterns
pub mod patterns {
    use super::*;

    /// A direct payment, settled on creation
    pub fn payment(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: BigDecimal,
        message: String,
    ) -> NewTransfer {
        NewTransfer::new(sender_id, receiver_id, amount, message).settle_now()
    }

    /// A payment request left pending until the sender accepts or declines it
    pub fn request(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: BigDecimal,
        message: String,
    ) -> NewTransfer {
        NewTransfer::new(sender_id, receiver_id, amount, message)
    }
}
