//! Money helpers with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are plain `rust_decimal::Decimal` values; the ledger tracks a single
//! currency, so no currency code travels with them.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places money is stored and compared with.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to the money scale using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if `paid` reaches `target` once `epsilon` of rounding slack is allowed.
///
/// Overpayment always covers the target.
#[must_use]
pub fn covers(paid: Decimal, target: Decimal, epsilon: Decimal) -> bool {
    paid >= target - epsilon
}

/// Splits `total` into `parts` amounts that sum exactly to `total`.
///
/// Every part is `total / parts` truncated toward zero at the money scale; the
/// last part absorbs whatever the truncation left over. Returns an empty vector
/// when `parts` is zero.
#[must_use]
pub fn split_evenly(total: Decimal, parts: u32) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }

    let base = (total / Decimal::from(parts))
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    let last = total - base * Decimal::from(parts - 1);

    let mut amounts = vec![base; parts as usize];
    if let Some(slot) = amounts.last_mut() {
        *slot = last;
    }
    amounts
}

/// Returns `max(0, amount)`.
#[must_use]
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

/// Computes `part / whole * 100` rounded to the money scale.
///
/// A zero `whole` yields zero instead of a division error.
#[must_use]
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_money(part / whole * Decimal::ONE_HUNDRED)
}
