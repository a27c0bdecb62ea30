//! Payments walkthrough: direct payments, requests and the integrity audit

use bigdecimal::BigDecimal;
use payments_ledger::utils::MemoryStorage;
use payments_ledger::{Ledger, LedgerError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Payments Ledger - Walkthrough\n");

    let ledger = Ledger::new(MemoryStorage::new());

    // 1. Open accounts
    let alice = ledger
        .create_account(
            "Alice".to_string(),
            "alice".to_string(),
            Some(BigDecimal::from(100)),
        )
        .await?;
    let bob = ledger
        .create_account("Bob".to_string(), "bob".to_string(), None)
        .await?;
    println!("  Opened {} (@{}) with {}", alice.name, alice.handle, alice.balance);
    println!("  Opened {} (@{}) with {}\n", bob.name, bob.handle, bob.balance);

    // 2. Direct payment
    let lunch = ledger
        .send(alice.id, bob.id, BigDecimal::from(30), "lunch".to_string())
        .await?;
    println!("  Paid {} for {} -> {}", lunch.amount, lunch.message, lunch.status);

    // 3. Payment that bounces
    match ledger
        .send(alice.id, bob.id, BigDecimal::from(500), "rent".to_string())
        .await
    {
        Err(err @ LedgerError::InsufficientFunds { .. }) => {
            println!("  Rent refused: {} (HTTP {})", err, err.http_status())
        }
        other => println!("  Unexpected result: {:?}", other),
    }

    // 4. Request, accept, and a second resolution attempt
    let gift = ledger
        .request(alice.id, bob.id, BigDecimal::from(40), "gift".to_string())
        .await?;
    println!("  Requested {} for {} -> {}", gift.amount, gift.message, gift.status);

    let gift = ledger.accept(gift.id).await?;
    println!("  Accepted request #{} -> {}", gift.id, gift.status);

    if let Err(err) = ledger.decline(gift.id).await {
        println!("  Declining again: {}", err);
    }

    // 5. History and balances
    println!("\nHistory for {}:", bob.name);
    for view in ledger.transaction_history(bob.id).await? {
        println!(
            "  #{} {} -> {} {} \"{}\" [{}]",
            view.id,
            view.sender_name.as_deref().unwrap_or("(closed)"),
            view.receiver_name.as_deref().unwrap_or("(closed)"),
            view.amount,
            view.message,
            view.status
        );
    }

    println!("\nBalances:");
    for account in ledger.list_accounts().await? {
        println!("  {:<6} {}", account.name, account.balance);
    }

    let report = ledger.validate_integrity().await?;
    println!(
        "\nIntegrity: {} (opening total {}, current total {})",
        if report.is_valid { "ok" } else { "FAILED" },
        report.opening_total,
        report.current_total
    );

    Ok(())
}
