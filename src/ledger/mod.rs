//! Ledger module containing account management and transfer processing

pub mod account;
pub mod core;
pub mod locks;
pub mod transaction;

pub use account::*;
pub use self::core::*;
pub use locks::*;
pub use transaction::*;
