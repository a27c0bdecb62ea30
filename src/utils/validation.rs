//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an amount has at most `max_places` decimal places
pub fn validate_amount_precision(amount: &BigDecimal, max_places: i64) -> LedgerResult<()> {
    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    if scale > max_places {
        return Err(LedgerError::Validation(format!(
            "Amount cannot have more than {} decimal places",
            max_places
        )));
    }
    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account handle is valid
pub fn validate_account_handle(handle: &str) -> LedgerResult<()> {
    if handle.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account handle cannot be empty".to_string(),
        ));
    }

    if handle.chars().count() > 50 {
        return Err(LedgerError::Validation(
            "Account handle cannot exceed 50 characters".to_string(),
        ));
    }

    // alphanumeric, dots, dashes, underscores
    if !handle
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "Account handle can only contain alphanumeric characters, dots, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that a transfer message is valid
pub fn validate_transfer_message(message: &str) -> LedgerResult<()> {
    if message.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Transfer message cannot be empty".to_string(),
        ));
    }

    if message.chars().count() > 280 {
        return Err(LedgerError::Validation(
            "Transfer message cannot exceed 280 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced transfer validator with detailed checks
pub struct EnhancedTransferValidator;

impl TransferValidator for EnhancedTransferValidator {
    fn validate_transfer(&self, transfer: &NewTransfer) -> LedgerResult<()> {
        validate_positive_amount(&transfer.amount)?;
        validate_amount_precision(&transfer.amount, 2)?;
        validate_transfer_message(&transfer.message)?;

        if transfer.sender_id == transfer.receiver_id {
            return Err(LedgerError::Validation(
                "Sender and receiver must be different accounts".to_string(),
            ));
        }

        Ok(())
    }
}

/// Enhanced account validator with detailed checks
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &NewAccount) -> LedgerResult<()> {
        validate_account_name(&account.name)?;
        validate_account_handle(&account.handle)?;

        if account.opening_balance < BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Opening balance cannot be negative".to_string(),
            ));
        }
        validate_amount_precision(&account.opening_balance, 2)
    }

    fn validate_account_deletion(&self, account: &Account) -> LedgerResult<()> {
        // Closing an account with money in it would destroy that money
        if account.balance != BigDecimal::from(0) {
            return Err(LedgerError::Validation(format!(
                "Account {} still holds a balance of {}",
                account.id, account.balance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_precision() {
        assert!(validate_amount_precision(&BigDecimal::from_str("10.25").unwrap(), 2).is_ok());
        assert!(validate_amount_precision(&BigDecimal::from_str("10.250").unwrap(), 2).is_ok());
        assert!(validate_amount_precision(&BigDecimal::from_str("10.255").unwrap(), 2).is_err());
        assert!(validate_amount_precision(&BigDecimal::from(500), 2).is_ok());
    }

    #[test]
    fn test_handle_charset() {
        assert!(validate_account_handle("alice.smith_01").is_ok());
        assert!(validate_account_handle("alice smith").is_err());
        assert!(validate_account_handle("@alice").is_err());
        assert!(validate_account_handle(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_lengths_count_characters() {
        assert!(validate_account_name(&"é".repeat(100)).is_ok());
        assert!(validate_account_name(&"é".repeat(101)).is_err());
        assert!(validate_account_handle(&"ü".repeat(50)).is_ok());
        assert!(validate_transfer_message(&"€".repeat(280)).is_ok());
        assert!(validate_transfer_message(&"€".repeat(281)).is_err());
    }

    #[test]
    fn test_enhanced_transfer_validator() {
        let validator = EnhancedTransferValidator;
        let ok = NewTransfer::new(1, 2, BigDecimal::from(5), "pizza".to_string());
        assert!(validator.validate_transfer(&ok).is_ok());

        let own = NewTransfer::new(1, 1, BigDecimal::from(5), "pizza".to_string());
        assert!(validator.validate_transfer(&own).is_err());

        let long = NewTransfer::new(1, 2, BigDecimal::from(5), "x".repeat(281));
        assert!(validator.validate_transfer(&long).is_err());
    }
}
