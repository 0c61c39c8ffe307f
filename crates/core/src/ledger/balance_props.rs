//! Property-based tests for balance reconciliation.
//!
//! - Transition deltas equal "reverse old, apply new"
//! - Stored balances match the log after any mix of create/edit/settle/delete

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CategoryId, TransactionId, UserId};

use super::balance::{AppliedState, BalanceDelta, BalanceService};
use super::engine::{LedgerEngine, LedgerSettings};
use super::memory::InMemoryLedgerStore;
use super::testing::{date, input, root};
use super::types::{
    AccountType, CategoryKind, NewAccount, NewCategory, SettlementInput, TransactionKind,
    TransactionStatus,
};

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![
        Just(TransactionKind::Income),
        Just(TransactionKind::Expense),
        Just(TransactionKind::Transfer),
    ]
}

fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![Just(TransactionStatus::Pending), Just(TransactionStatus::Paid)]
}

/// One step of a random ledger session.
#[derive(Debug, Clone)]
enum Step {
    Create(TransactionKind, Decimal, TransactionStatus, bool),
    Edit(usize, Decimal, TransactionStatus, bool),
    Settle(usize, Decimal),
    Delete(usize, bool),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (kind_strategy(), positive_amount(), status_strategy(), any::<bool>())
            .prop_map(|(k, a, s, second)| Step::Create(k, a, s, second)),
        (any::<usize>(), positive_amount(), status_strategy(), any::<bool>())
            .prop_map(|(i, a, s, second)| Step::Edit(i, a, s, second)),
        (any::<usize>(), positive_amount()).prop_map(|(i, a)| Step::Settle(i, a)),
        (any::<usize>(), any::<bool>()).prop_map(|(i, force)| Step::Delete(i, force)),
    ]
}

fn apply_all(balances: &mut [(AccountId, Decimal)], deltas: &[BalanceDelta]) {
    for delta in deltas {
        if let Some(slot) = balances.iter_mut().find(|(id, _)| *id == delta.account_id) {
            slot.1 += delta.amount;
        }
    }
}

async fn run_session(steps: Vec<Step>) -> bool {
    let store = Arc::new(InMemoryLedgerStore::new());
    let engine = LedgerEngine::new(store, LedgerSettings::default());
    let user = UserId::new();

    let mut accounts = Vec::new();
    for name in ["Checking", "Savings"] {
        let account = engine
            .create_account(
                user,
                NewAccount {
                    name: name.to_string(),
                    account_type: AccountType::Checking,
                    color: None,
                    initial_balance: Decimal::new(100_000, 2),
                },
            )
            .await
            .unwrap();
        accounts.push(account.id);
    }
    let category: CategoryId = engine
        .create_category(
            user,
            NewCategory {
                name: "General".to_string(),
                kind: CategoryKind::Expense,
                dre_category: None,
            },
        )
        .await
        .unwrap()
        .id;

    let mut created: Vec<TransactionId> = Vec::new();
    let data_for = |kind: TransactionKind, amount: Decimal, status: TransactionStatus, second: bool| {
        let (from, to) = if second {
            (accounts[1], accounts[0])
        } else {
            (accounts[0], accounts[1])
        };
        let mut data = input(kind, amount, status, from, Some(category));
        if kind == TransactionKind::Transfer {
            data.to_account_id = Some(to);
        }
        data
    };

    for step in steps {
        // Rule violations are expected for random steps; only consistency matters.
        match step {
            Step::Create(kind, amount, status, second) => {
                if let Ok(outcome) = engine
                    .save_transaction(user, data_for(kind, amount, status, second), None, None)
                    .await
                {
                    created.extend(outcome.transaction_ids);
                }
            }
            Step::Edit(i, amount, status, second) if !created.is_empty() => {
                let id = created[i % created.len()];
                let kind = engine
                    .snapshot(user)
                    .await
                    .unwrap()
                    .transaction(id)
                    .map_or(TransactionKind::Expense, |t| t.kind);
                let _ = engine
                    .save_transaction(user, data_for(kind, amount, status, second), Some(id), None)
                    .await;
            }
            Step::Settle(i, amount) if !created.is_empty() => {
                let root_id = created[i % created.len()];
                let settlement = SettlementInput {
                    root_id,
                    actual_amount: amount,
                    payment_date: date(2026, 2, 1),
                    account_id: accounts[0],
                    payment_method: None,
                    tags: vec![],
                    observation: None,
                    receipt_ref: None,
                };
                if let Ok(outcome) = engine.settle(user, settlement, None).await {
                    created.extend(outcome.child_id);
                }
            }
            Step::Delete(i, force) if !created.is_empty() => {
                let id = created[i % created.len()];
                let _ = engine.delete_transaction(user, id, force, None).await;
            }
            _ => {}
        }
    }

    engine.verify_balances(user).await.unwrap().is_consistent()
}

proptest! {
    /// Transition deltas equal reversing the old effect and applying the new one.
    #[test]
    fn test_transition_matches_reverse_then_apply(
        old_kind in kind_strategy(),
        new_kind in kind_strategy(),
        old_amount in positive_amount(),
        new_amount in positive_amount(),
        old_status in status_strategy(),
        new_status in status_strategy(),
        move_account in any::<bool>(),
    ) {
        let a = AccountId::new();
        let b = AccountId::new();
        let c = AccountId::new();

        let mut old = root(old_kind, old_amount, old_status, a);
        old.to_account_id = Some(b);
        let mut new = root(new_kind, new_amount, new_status, if move_account { c } else { a });
        new.to_account_id = Some(if move_account { a } else { b });

        let mut via_transition = vec![(a, Decimal::ZERO), (b, Decimal::ZERO), (c, Decimal::ZERO)];
        let mut via_steps = via_transition.clone();

        let deltas = BalanceService::transition(
            AppliedState::of(&old, false).as_ref(),
            AppliedState::of(&new, false).as_ref(),
        );
        apply_all(&mut via_transition, &deltas);
        apply_all(&mut via_steps, &BalanceService::reverse(&old, false));
        apply_all(&mut via_steps, &BalanceService::apply(&new));

        prop_assert_eq!(via_transition, via_steps);
        prop_assert!(deltas.iter().all(|d| !d.amount.is_zero()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Stored balances always equal the balances derived from the log.
    #[test]
    fn test_balances_stay_consistent(steps in prop::collection::vec(step_strategy(), 1..25)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        prop_assert!(runtime.block_on(run_session(steps)));
    }
}
