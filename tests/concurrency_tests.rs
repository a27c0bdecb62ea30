//! Concurrent transfers against shared accounts

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use payments_ledger::{
    utils::MemoryStorage, Account, AccountId, Ledger, LedgerBatch, LedgerConfig, LedgerError,
    LedgerResult, LedgerStorage, NewAccount, Transaction, TransactionId, TransactionStatus,
};

async fn funded_ledger(balances: &[i64]) -> (Arc<Ledger<MemoryStorage>>, Vec<u64>) {
    let ledger = Arc::new(Ledger::new(MemoryStorage::new()));
    let mut ids = Vec::new();
    for (i, balance) in balances.iter().enumerate() {
        let account = ledger
            .create_account(
                format!("User {}", i),
                format!("user{}", i),
                Some(BigDecimal::from(*balance)),
            )
            .await
            .unwrap();
        ids.push(account.id);
    }
    (ledger, ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let (ledger, ids) = funded_ledger(&[100, 0, 0, 0]).await;
    let sender = ids[0];

    // 30 payments of 10 against a balance of 100: exactly 10 can succeed
    let mut handles = Vec::new();
    for i in 0..30usize {
        let ledger = ledger.clone();
        let receiver = ids[1 + i % 3];
        handles.push(tokio::spawn(async move {
            ledger
                .send(sender, receiver, BigDecimal::from(10), format!("p{}", i))
                .await
        }));
    }

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(txn) => {
                assert_eq!(txn.status, TransactionStatus::Accepted);
                settled += 1;
            }
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(settled, 10);
    assert_eq!(
        ledger.get_account(sender).await.unwrap().balance,
        BigDecimal::from(0)
    );
    assert_eq!(ledger.total_balance().await.unwrap(), BigDecimal::from(100));
    assert!(ledger.validate_integrity().await.unwrap().is_valid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_resolutions_settle_once() {
    let (ledger, ids) = funded_ledger(&[50, 0]).await;
    let pending = ledger
        .request(ids[0], ids[1], BigDecimal::from(20), "split".to_string())
        .await
        .unwrap();
    let transaction_id = pending.id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.resolve(transaction_id, i % 2 == 0).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(LedgerError::AlreadyFinal { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(winners, 1);

    let final_txn = ledger.get_transaction(transaction_id).await.unwrap();
    let sender_balance = ledger.get_account(ids[0]).await.unwrap().balance;
    match final_txn.status {
        TransactionStatus::Accepted => assert_eq!(sender_balance, BigDecimal::from(30)),
        TransactionStatus::Declined => assert_eq!(sender_balance, BigDecimal::from(50)),
        TransactionStatus::Pending => panic!("transaction left pending"),
    }
    assert_eq!(ledger.total_balance().await.unwrap(), BigDecimal::from(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    let (ledger, ids) = funded_ledger(&[1_000, 1_000]).await;

    let mut handles = Vec::new();
    for i in 0..50usize {
        let ledger = ledger.clone();
        let (from, to) = if i % 2 == 0 {
            (ids[0], ids[1])
        } else {
            (ids[1], ids[0])
        };
        handles.push(tokio::spawn(async move {
            ledger
                .send(from, to, BigDecimal::from(3), "back and forth".to_string())
                .await
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(all.is_ok(), "transfers did not finish");

    assert_eq!(
        ledger.get_account(ids[0]).await.unwrap().balance,
        BigDecimal::from(1_000)
    );
    assert_eq!(ledger.total_balance().await.unwrap(), BigDecimal::from(2_000));
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_debits_never_overdraw() {
    use payments_ledger::utils::SqliteStorage;

    let ledger = Arc::new(Ledger::new(SqliteStorage::in_memory().unwrap()));
    let a = ledger
        .create_account("A".to_string(), "a".to_string(), Some(BigDecimal::from(100)))
        .await
        .unwrap()
        .id;
    let b = ledger
        .create_account("B".to_string(), "b".to_string(), None)
        .await
        .unwrap()
        .id;

    // 30 payments of 7 against 100: 14 fit, 2 is left over
    let mut handles = Vec::new();
    for i in 0..30usize {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .send(a, b, BigDecimal::from(7), format!("p{}", i))
                .await
        }));
    }

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(settled, 14);
    assert_eq!(
        ledger.get_account(a).await.unwrap().balance,
        BigDecimal::from(2)
    );
    assert_eq!(
        ledger.get_account(b).await.unwrap().balance,
        BigDecimal::from(98)
    );
    assert_eq!(
        ledger.list_transactions_for_account(a).await.unwrap().len(),
        14
    );
    let report = ledger.validate_integrity().await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
}

/// Storage whose commits take a while, to keep account locks held
#[derive(Clone)]
struct SlowStorage {
    inner: MemoryStorage,
    delay: Duration,
}

#[async_trait]
impl LedgerStorage for SlowStorage {
    async fn insert_account(&self, account: NewAccount) -> LedgerResult<Account> {
        self.inner.insert_account(account).await
    }

    async fn get_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        self.inner.get_account(account_id).await
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.inner.list_accounts().await
    }

    async fn delete_account(&self, account_id: AccountId) -> LedgerResult<Option<Account>> {
        self.inner.delete_account(account_id).await
    }

    async fn adjust_balance(
        &self,
        account_id: AccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        self.inner.adjust_balance(account_id, delta).await
    }

    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        self.inner.get_transaction(transaction_id).await
    }

    async fn get_account_transactions(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>> {
        self.inner.get_account_transactions(account_id).await
    }

    async fn get_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        self.inner.get_transactions().await
    }

    async fn commit(&self, batch: LedgerBatch) -> LedgerResult<Transaction> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit(batch).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_timeout_is_retryable_and_moves_nothing() {
    let storage = SlowStorage {
        inner: MemoryStorage::new(),
        delay: Duration::from_millis(300),
    };
    let ledger = Arc::new(Ledger::with_config(
        storage.clone(),
        LedgerConfig::default().with_lock_timeout(Duration::from_millis(30)),
    ));
    let a = ledger
        .create_account("A".to_string(), "a".to_string(), Some(BigDecimal::from(10)))
        .await
        .unwrap()
        .id;
    let b = ledger
        .create_account("B".to_string(), "b".to_string(), None)
        .await
        .unwrap()
        .id;

    let slow = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .send(a, b, BigDecimal::from(4), "slow".to_string())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let blocked = ledger
        .send(b, a, BigDecimal::from(1), "blocked".to_string())
        .await;
    let err = blocked.unwrap_err();
    assert!(matches!(err, LedgerError::LockTimeout(_)));
    assert!(err.is_retryable());
    assert_eq!(err.http_status(), 503);

    slow.await.unwrap().unwrap();
    assert_eq!(
        ledger.get_account(a).await.unwrap().balance,
        BigDecimal::from(6)
    );
    assert_eq!(
        ledger.get_account(b).await.unwrap().balance,
        BigDecimal::from(4)
    );
    assert_eq!(storage.inner.get_transactions().await.unwrap().len(), 1);
}
