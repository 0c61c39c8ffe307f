//! Property-based tests for settlement and installment splitting.
//!
//! - Remaining balance is never negative
//! - A root flips to paid exactly when its settlements cover it
//! - Installment splits sum to the entry total

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saldo_shared::types::AccountId;
use saldo_shared::types::money::split_evenly;

use super::error::LedgerError;
use super::index::LedgerSnapshot;
use super::settlement::{plan, remaining};
use super::testing::{account, date, root};
use super::types::{SettlementInput, SettlementState, TransactionKind, TransactionStatus};

const EPS: Decimal = dec!(0.01);

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    /// Settling in arbitrary chunks never leaves a negative remainder, and the
    /// root is paid exactly once the chunks reach its amount minus epsilon.
    #[test]
    fn test_settlement_sequence(
        amount in positive_amount(),
        chunks in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let a = AccountId::new();
        let parent = root(TransactionKind::Expense, amount, TransactionStatus::Pending, a);
        let mut snapshot = LedgerSnapshot {
            accounts: vec![account(a, Decimal::ZERO)],
            categories: vec![],
            transactions: vec![parent.clone()],
        };

        let mut paid = Decimal::ZERO;
        for chunk in chunks {
            let input = SettlementInput {
                root_id: parent.id,
                actual_amount: chunk,
                payment_date: date(2026, 5, 1),
                account_id: a,
                payment_method: None,
                tags: vec![],
                observation: None,
                receipt_ref: None,
            };

            match plan(&snapshot, &input, EPS, Utc::now()) {
                Ok(planned) => {
                    paid += chunk;
                    prop_assert_eq!(planned.outcome.paid_total, paid);
                    prop_assert!(planned.outcome.remaining >= Decimal::ZERO);

                    let covered = paid >= amount - EPS;
                    prop_assert_eq!(planned.root_update.is_some(), covered);
                    prop_assert_eq!(
                        planned.outcome.state,
                        if covered { SettlementState::Paid } else { SettlementState::Partial }
                    );

                    snapshot.transactions.push(planned.child);
                    if let Some(updated) = planned.root_update {
                        let slot = snapshot
                            .transactions
                            .iter_mut()
                            .find(|t| t.id == updated.id)
                            .unwrap();
                        *slot = updated;
                    }
                }
                Err(LedgerError::AlreadyPaid(_)) => {
                    prop_assert!(paid >= amount - EPS);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }

            let index = snapshot.index();
            let current = index.get(parent.id).unwrap();
            prop_assert!(remaining(current, &index) >= Decimal::ZERO);
        }
    }

    /// Installments always add back up to the total and differ by the remainder only.
    #[test]
    fn test_installments_sum_to_total(total in positive_amount(), parts in 1u32..=120) {
        let amounts = split_evenly(total, parts);
        prop_assert_eq!(amounts.len(), parts as usize);
        prop_assert_eq!(amounts.iter().copied().sum::<Decimal>(), total);

        let first = amounts[0];
        prop_assert!(amounts[..amounts.len() - 1].iter().all(|x| *x == first));
        let last = amounts[amounts.len() - 1];
        prop_assert!(last >= first);
        prop_assert!(last - first < Decimal::new(1, 2) * Decimal::from(parts));
    }
}
