//! Core types and data structures for the payments ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier assigned to an account by the storage backend
pub type AccountId = u64;

/// Identifier assigned to a transaction by the storage backend
pub type TransactionId = u64;

/// Lifecycle status of a transaction
///
/// `Pending` means no decision has been recorded yet. `Accepted` and
/// `Declined` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting a decision, no balance effect yet
    Pending,
    /// Settled, the amount has moved from sender to receiver
    Accepted,
    /// Refused, no balance effect ever
    Declined,
}

impl TransactionStatus {
    /// Whether no further transition is possible
    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Accepted => "accepted",
            TransactionStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "accepted" => Ok(TransactionStatus::Accepted),
            "declined" => Ok(TransactionStatus::Declined),
            other => Err(LedgerError::Storage(format!(
                "Unknown transaction status '{}'",
                other
            ))),
        }
    }
}

/// A user account holding a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier, assigned on creation
    pub id: AccountId,
    /// Display name of the account holder
    pub name: String,
    /// Public handle (username) of the account holder
    pub handle: String,
    /// Current balance of the account
    pub balance: BigDecimal,
    /// Balance the account was opened with
    pub opening_balance: BigDecimal,
    /// When the account was created
    pub created_at: NaiveDateTime,
}

/// Fields required to open a new account; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub handle: String,
    pub opening_balance: BigDecimal,
    pub created_at: NaiveDateTime,
}

impl NewAccount {
    /// Create a new account draft stamped with the current time
    pub fn new(name: String, handle: String, opening_balance: BigDecimal) -> Self {
        Self {
            name,
            handle,
            opening_balance,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Record of value moving from one account to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier, assigned in creation order
    pub id: TransactionId,
    /// When the transaction was created
    pub timestamp: NaiveDateTime,
    /// Account paying the amount
    pub sender_id: AccountId,
    /// Account receiving the amount
    pub receiver_id: AccountId,
    /// Amount moved, always positive
    pub amount: BigDecimal,
    /// Free-text note attached by the sender
    pub message: String,
    /// Lifecycle status
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Whether the account is the sender or the receiver
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.sender_id == account_id || self.receiver_id == account_id
    }

    /// Net effect of this transaction on the given account's balance
    pub fn balance_effect(&self, account_id: AccountId) -> BigDecimal {
        if self.status != TransactionStatus::Accepted {
            return BigDecimal::from(0);
        }
        let mut effect = BigDecimal::from(0);
        if self.sender_id == account_id {
            effect -= &self.amount;
        }
        if self.receiver_id == account_id {
            effect += &self.amount;
        }
        effect
    }
}

/// Transaction fields prior to the store assigning an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub timestamp: NaiveDateTime,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: BigDecimal,
    pub message: String,
    pub status: TransactionStatus,
}

/// A transfer as requested by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: BigDecimal,
    pub message: String,
    /// Settle immediately instead of leaving the transfer pending
    pub settle_now: bool,
}

impl NewTransfer {
    /// Create a pending transfer request
    pub fn new(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: BigDecimal,
        message: String,
    ) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
            message,
            settle_now: false,
        }
    }

    /// Request immediate settlement
    pub fn settle_now(mut self) -> Self {
        self.settle_now = true;
        self
    }

    /// Build the record to insert with the given initial status
    pub(crate) fn into_record(self, status: TransactionStatus) -> NewTransaction {
        NewTransaction {
            timestamp: chrono::Utc::now().naive_utc(),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            amount: self.amount,
            message: self.message,
            status,
        }
    }
}

/// A signed balance change against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account_id: AccountId,
    pub delta: BigDecimal,
}

impl Posting {
    pub fn debit(account_id: AccountId, amount: &BigDecimal) -> Self {
        Self {
            account_id,
            delta: -amount.clone(),
        }
    }

    pub fn credit(account_id: AccountId, amount: &BigDecimal) -> Self {
        Self {
            account_id,
            delta: amount.clone(),
        }
    }
}

/// The transaction record write that accompanies a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionWrite {
    /// Insert a new record
    Insert(NewTransaction),
    /// Move a pending record to a terminal status
    Resolve {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
}

/// Balance postings plus a record write, committed all-or-nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerBatch {
    pub postings: Vec<Posting>,
    pub write: TransactionWrite,
}

impl LedgerBatch {
    /// Batch that only writes a record
    pub fn record_only(write: TransactionWrite) -> Self {
        Self {
            postings: Vec::new(),
            write,
        }
    }

    /// Batch that moves `amount` from sender to receiver alongside the write
    pub fn transfer(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: &BigDecimal,
        write: TransactionWrite,
    ) -> Self {
        Self {
            postings: vec![
                Posting::debit(sender_id, amount),
                Posting::credit(receiver_id, amount),
            ],
            write,
        }
    }
}

/// An account together with its full transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

/// Transaction as seen from an account history, with counterparty names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub timestamp: NaiveDateTime,
    /// `None` when the sender account no longer exists
    pub sender_name: Option<String>,
    /// `None` when the receiver account no longer exists
    pub receiver_name: Option<String>,
    pub amount: BigDecimal,
    pub message: String,
    pub status: TransactionStatus,
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Insufficient funds in account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        available: BigDecimal,
        requested: BigDecimal,
    },
    #[error("Transaction {transaction_id} is already {status}")]
    AlreadyFinal {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
    #[error("Timed out waiting for lock on account {0}")]
    LockTimeout(AccountId),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound(_) | LedgerError::TransactionNotFound(_)
        )
    }

    /// Transient failures where nothing was applied and the call may be repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::LockTimeout(_))
    }

    /// HTTP status an API layer should answer with for this error
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::AccountNotFound(_) | LedgerError::TransactionNotFound(_) => 404,
            LedgerError::Validation(_) => 400,
            LedgerError::InsufficientFunds { .. } | LedgerError::AlreadyFinal { .. } => 403,
            LedgerError::LockTimeout(_) => 503,
            LedgerError::Storage(_) => 500,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
