//! SQLite storage implementation
//!
//! Amounts are stored as decimal TEXT so no precision is lost. The
//! `sender_id`/`receiver_id` columns reference `accounts(id)` but foreign key
//! enforcement stays off: history outlives deleted accounts.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::*;
use crate::types::*;

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

const ACCOUNT_COLUMNS: &str = "id, name, handle, balance, opening_balance, created_at";
const TRANSACTION_COLUMNS: &str =
    "id, timestamp, sender_id, receiver_id, amount, message, status";

/// SQLite-backed storage; clones share one connection
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) a database file at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> LedgerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> LedgerResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Storage("sqlite connection lock poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> LedgerResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            handle TEXT NOT NULL,
            balance TEXT NOT NULL,
            opening_balance TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            sender_id INTEGER NOT NULL REFERENCES accounts(id),
            receiver_id INTEGER NOT NULL REFERENCES accounts(id),
            amount TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions(sender_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_receiver ON transactions(receiver_id);",
    )?;
    Ok(())
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<BigDecimal> {
    let text: String = row.get(idx)?;
    BigDecimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let id: i64 = row.get(idx)?;
    u64::try_from(id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        handle: row.get(2)?,
        balance: decimal_column(row, 3)?,
        opening_balance: decimal_column(row, 4)?,
        created_at: row.get(5)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let status: String = row.get(6)?;
    Ok(Transaction {
        id: id_column(row, 0)?,
        timestamp: row.get(1)?,
        sender_id: id_column(row, 2)?,
        receiver_id: id_column(row, 3)?,
        amount: decimal_column(row, 4)?,
        message: row.get(5)?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
    })
}

fn select_account(conn: &Connection, account_id: AccountId) -> LedgerResult<Option<Account>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
            params![account_id as i64],
            account_from_row,
        )
        .optional()?)
}

fn select_transaction(
    conn: &Connection,
    transaction_id: TransactionId,
) -> LedgerResult<Option<Transaction>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM transactions WHERE id = ?1",
                TRANSACTION_COLUMNS
            ),
            params![transaction_id as i64],
            transaction_from_row,
        )
        .optional()?)
}

fn account_exists(conn: &Connection, account_id: AccountId) -> LedgerResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM accounts WHERE id = ?1",
            params![account_id as i64],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn adjust(conn: &Connection, account_id: AccountId, delta: &BigDecimal) -> LedgerResult<BigDecimal> {
    let account =
        select_account(conn, account_id)?.ok_or(LedgerError::AccountNotFound(account_id))?;
    let balance = account.balance + delta;
    conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        params![balance.to_string(), account_id as i64],
    )?;
    Ok(balance)
}

fn check_batch(conn: &Connection, batch: &LedgerBatch) -> LedgerResult<()> {
    for posting in &batch.postings {
        if !account_exists(conn, posting.account_id)? {
            return Err(LedgerError::AccountNotFound(posting.account_id));
        }
    }

    match &batch.write {
        TransactionWrite::Insert(record) => {
            for account_id in [record.sender_id, record.receiver_id] {
                if !account_exists(conn, account_id)? {
                    return Err(LedgerError::AccountNotFound(account_id));
                }
            }
        }
        TransactionWrite::Resolve { transaction_id, .. } => {
            let existing = select_transaction(conn, *transaction_id)?
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

fn write_record(conn: &Connection, write: TransactionWrite) -> LedgerResult<Transaction> {
    let transaction_id = match write {
        TransactionWrite::Insert(record) => {
            conn.execute(
                "INSERT INTO transactions
                 (timestamp, sender_id, receiver_id, amount, message, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.timestamp,
                    record.sender_id as i64,
                    record.receiver_id as i64,
                    record.amount.to_string(),
                    record.message,
                    record.status.as_str(),
                ],
            )?;
            conn.last_insert_rowid() as TransactionId
        }
        TransactionWrite::Resolve {
            transaction_id,
            status,
        } => {
            conn.execute(
                "UPDATE transactions SET status = ?1 WHERE id = ?2",
                params![status.as_str(), transaction_id as i64],
            )?;
            transaction_id
        }
    };

    select_transaction(conn, transaction_id)?
        .ok_or(LedgerError::TransactionNotFound(transaction_id))
}

#[async_trait]
impl LedgerStorage for SqliteStorage {
    async fn insert_account(&self, account: NewAccount) -> LedgerResult<Account> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (name, handle, balance, opening_balance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.name,
                account.handle,
                account.opening_balance.to_string(),
                account.opening_balance.to_string(),
                account.created_at,
            ],
        )?;
        let id = conn.last_insert_rowid() as AccountId;
        select_account(&conn, id)?.ok_or(LedgerError::AccountNotFound(id))
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        let conn = self.lock()?;
        select_account(&conn, account_id)
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing = select_account(&tx, account_id)?;
        if existing.is_some() {
            tx.execute(
                "DELETE FROM accounts WHERE id = ?1",
                params![account_id as i64],
            )?;
        }
        tx.commit()?;
        Ok(existing)
    }

    async fn adjust_balance(
        &self,
        account_id: AccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let balance = adjust(&tx, account_id, delta)?;
        tx.commit()?;
        Ok(balance)
    }

    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        let conn = self.lock()?;
        select_transaction(&conn, transaction_id)
    }

    async fn get_account_transactions(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE sender_id = ?1 OR receiver_id = ?1 ORDER BY id",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map(params![account_id as i64], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    async fn get_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY id",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map([], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    async fn commit(&self, batch: LedgerBatch) -> LedgerResult<Transaction> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        check_batch(&tx, &batch)?;
        for posting in &batch.postings {
            adjust(&tx, posting.account_id, &posting.delta)?;
        }
        let transaction = write_record(&tx, batch.write)?;
        tx.commit()?;
        Ok(transaction)
    }
}
