//! # Payments Ledger
//!
//! A balance-transfer ledger: accounts with balances, direct payments,
//! payment requests that are later accepted or declined, and an immutable
//! transaction history.
//!
//! ## Features
//!
//! - **Atomic settlement**: a transfer's debit, credit and record write commit together or not at all
//! - **Two-phase requests**: pending transfers are accepted (re-checking funds) or declined exactly once
//! - **Per-account locking**: concurrent transfers on the same account are serialized, others run in parallel
//! - **Integrity audit**: balances are recomputed from opening balances and accepted transfers
//! - **Storage abstraction**: trait-based storage with in-memory and SQLite backends
//!
//! ## Quick Start
//!
//! ```rust
//! use payments_ledger::{utils::MemoryStorage, Ledger, TransactionStatus};
//! use bigdecimal::BigDecimal;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), payments_ledger::LedgerError> {
//! let ledger = Ledger::new(MemoryStorage::new());
//! let alice = ledger
//!     .create_account("Alice".into(), "alice".into(), Some(BigDecimal::from(100)))
//!     .await?;
//! let bob = ledger.create_account("Bob".into(), "bob".into(), None).await?;
//!
//! let txn = ledger
//!     .send(alice.id, bob.id, BigDecimal::from(30), "lunch".into())
//!     .await?;
//! assert_eq!(txn.status, TransactionStatus::Accepted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use ledger::*;
pub use traits::*;
pub use types::*;

// Re-export transfer patterns for convenience
pub use ledger::transaction::patterns;
