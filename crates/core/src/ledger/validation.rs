//! Business rule validation for transaction inputs.
//!
//! Every check runs before any write, against the snapshot the engine loaded.

use rust_decimal::Decimal;
use saldo_shared::types::AccountId;

use super::error::LedgerError;
use super::index::LedgerSnapshot;
use super::types::{TransactionInput, TransactionKind};

/// Checks that `amount` is strictly positive.
///
/// # Errors
///
/// Returns [`LedgerError::NonPositiveAmount`] otherwise.
pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    Ok(())
}

/// Checks that `account_id` exists in the snapshot.
pub fn validate_account(snapshot: &LedgerSnapshot, account_id: AccountId) -> Result<(), LedgerError> {
    snapshot
        .account(account_id)
        .map(|_| ())
        .ok_or(LedgerError::AccountNotFound(account_id))
}

/// Validates a create/edit input.
///
/// `max_installments` bounds `recurrence_count`; recurrence fields are only
/// checked when `check_recurrence` is set (edits ignore them).
///
/// # Errors
///
/// Returns the first rule the input breaks.
pub fn validate_input(
    input: &TransactionInput,
    snapshot: &LedgerSnapshot,
    max_installments: u32,
    check_recurrence: bool,
) -> Result<(), LedgerError> {
    validate_amount(input.amount)?;

    if input.description.trim().is_empty() {
        return Err(LedgerError::MissingDescription);
    }

    let account_id = input.account_id.ok_or(LedgerError::MissingAccount)?;
    validate_account(snapshot, account_id)?;

    match input.kind {
        TransactionKind::Transfer => {
            let to = input
                .to_account_id
                .ok_or(LedgerError::MissingDestinationAccount)?;
            if to == account_id {
                return Err(LedgerError::SameAccountTransfer);
            }
            validate_account(snapshot, to)?;
        }
        TransactionKind::Income | TransactionKind::Expense => {
            let category_id = input.category_id.ok_or(LedgerError::MissingCategory)?;
            if snapshot.category(category_id).is_none() {
                return Err(LedgerError::CategoryNotFound(category_id));
            }
        }
    }

    if check_recurrence && input.is_recurring {
        if input.recurring_type.is_none() {
            return Err(LedgerError::MissingRecurringType);
        }
        if let Some(count) = input.recurrence_count {
            if count == 0 || count > max_installments {
                return Err(LedgerError::InvalidRecurrenceCount {
                    count,
                    max: max_installments,
                });
            }
        }
    }

    Ok(())
}
