//! Recurrence expansion.
//!
//! A recurring entry is materialised eagerly into independent monthly roots.
//! Occurrence `i` (0-based) is dated `base + i months`, computed from the base
//! date each time so that a 31st clamps per month instead of drifting.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, TransactionId};
use saldo_shared::types::money::split_evenly;

use super::error::LedgerError;
use super::types::{RecurringType, Transaction, TransactionInput, TransactionStatus};

/// Limits applied while expanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrencePolicy {
    /// Occurrences of a FIXED entry without an explicit count.
    pub fixed_horizon_months: u32,
    /// Maximum occurrences per entry.
    pub max_installments: u32,
}

/// Date of occurrence `offset` (0-based) of a series starting on `base`.
///
/// Returns `None` past the calendar range chrono supports.
#[must_use]
pub fn occurrence_date(base: NaiveDate, offset: u32) -> Option<NaiveDate> {
    base.checked_add_months(Months::new(offset))
}

/// Expands `input` into the roots to persist.
///
/// Non-recurring input yields one root. INSTALLMENT splits the amount over
/// `recurrence_count` roots suffixed ` (i/N)`; FIXED repeats the amount for
/// `recurrence_count` months or the policy horizon. Only the first occurrence
/// keeps a paid status, the rest start pending.
///
/// # Errors
///
/// Returns [`LedgerError::MissingAccount`] without an account, and
/// [`LedgerError::InvalidRecurrenceCount`] for a missing or out-of-range count.
pub fn expand(
    input: &TransactionInput,
    policy: RecurrencePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Transaction>, LedgerError> {
    let account_id = input.account_id.ok_or(LedgerError::MissingAccount)?;

    let recurring_type = match (input.is_recurring, input.recurring_type) {
        (false, _) => return Ok(vec![occurrence(input, account_id, input.amount, input.date, now)]),
        (true, None) => return Err(LedgerError::MissingRecurringType),
        (true, Some(kind)) => kind,
    };

    let count = match recurring_type {
        RecurringType::Installment => input.recurrence_count.unwrap_or(0),
        RecurringType::Fixed => input
            .recurrence_count
            .unwrap_or(policy.fixed_horizon_months),
    };
    if count == 0 || count > policy.max_installments {
        return Err(LedgerError::InvalidRecurrenceCount {
            count,
            max: policy.max_installments,
        });
    }

    let amounts = match recurring_type {
        RecurringType::Installment => split_evenly(input.amount, count),
        RecurringType::Fixed => vec![input.amount; count as usize],
    };
    if let Some(empty) = amounts.iter().find(|amount| **amount <= Decimal::ZERO) {
        return Err(LedgerError::NonPositiveAmount(*empty));
    }

    amounts
        .into_iter()
        .zip(0..count)
        .map(|(amount, offset)| {
            let date = occurrence_date(input.date, offset).ok_or(
                LedgerError::InvalidRecurrenceCount {
                    count,
                    max: policy.max_installments,
                },
            )?;
            let mut tx = occurrence(input, account_id, amount, date, now);
            tx.is_recurring = true;
            tx.recurring_type = Some(recurring_type);
            tx.installment_current = Some(offset + 1);
            if recurring_type == RecurringType::Installment {
                tx.installment_total = Some(count);
                tx.description = format!("{} ({}/{count})", input.description.trim(), offset + 1);
            }
            if offset > 0 {
                tx.status = TransactionStatus::Pending;
                tx.payment_date = None;
            }
            Ok(tx)
        })
        .collect()
}

fn occurrence(
    input: &TransactionInput,
    account_id: AccountId,
    amount: Decimal,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        description: input.description.trim().to_string(),
        amount,
        date,
        payment_date: input.effective_payment_date(),
        kind: input.kind,
        status: input.status,
        account_id,
        to_account_id: input.effective_destination(),
        category_id: input.effective_category(),
        parent_id: None,
        is_recurring: false,
        recurring_type: None,
        installment_current: None,
        installment_total: None,
        payment_method: input.payment_method.clone(),
        tags: input.tags.clone(),
        observation: input.observation.clone(),
        receipt_ref: None,
        created_at: now,
        updated_at: now,
    }
}
