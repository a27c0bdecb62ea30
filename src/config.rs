//! Ledger configuration
//!
//! Every field has a serde default so a partial config file deserializes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// How long a transfer waits for an account lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Whether an account may pay itself
    #[serde(default = "default_allow_self_transfer")]
    pub allow_self_transfer: bool,

    /// Upper bound on transfer message length, in characters
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_allow_self_transfer() -> bool {
    true
}

fn default_max_message_len() -> usize {
    500
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            allow_self_transfer: default_allow_self_transfer(),
            max_message_len: default_max_message_len(),
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_self_transfer(mut self, allow: bool) -> Self {
        self.allow_self_transfer = allow;
        self
    }

    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }
}
