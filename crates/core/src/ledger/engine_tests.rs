//! Engine tests against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saldo_shared::types::{AccountId, CategoryId, OperationId, TransactionId, UserId};

use super::engine::{DeleteOutcome, LedgerEngine, LedgerSettings};
use super::error::LedgerError;
use super::memory::InMemoryLedgerStore;
use super::store::{LedgerStore, StoreError};
use super::testing::{date, input};
use super::types::{
    Account, AccountType, Category, CategoryKind, DreCategory, NewAccount, NewCategory,
    RecurringType, SettlementInput, SettlementState, Transaction, TransactionKind,
    TransactionStatus,
};
use crate::reports::{DateRange, Regime};

struct Fixture {
    engine: LedgerEngine,
    store: Arc<InMemoryLedgerStore>,
    user: UserId,
    a: AccountId,
    b: AccountId,
    groceries: CategoryId,
    salary: CategoryId,
}

impl Fixture {
    async fn new() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let engine = LedgerEngine::new(store.clone(), LedgerSettings::default());
        let user = UserId::new();

        let a = open(&engine, user, "Checking", dec!(1000)).await;
        let b = open(&engine, user, "Savings", dec!(500)).await;
        let groceries = engine
            .create_category(
                user,
                NewCategory {
                    name: "Groceries".to_string(),
                    kind: CategoryKind::Expense,
                    dre_category: Some(DreCategory::DirectCosts),
                },
            )
            .await
            .unwrap()
            .id;
        let salary = engine
            .create_category(
                user,
                NewCategory {
                    name: "Sales".to_string(),
                    kind: CategoryKind::Income,
                    dre_category: Some(DreCategory::GrossRevenue),
                },
            )
            .await
            .unwrap()
            .id;

        Self {
            engine,
            store,
            user,
            a,
            b,
            groceries,
            salary,
        }
    }

    async fn balance(&self, id: AccountId) -> Decimal {
        self.engine
            .list_accounts(self.user)
            .await
            .unwrap()
            .into_iter()
            .find(|acc| acc.id == id)
            .map(|acc| acc.balance)
            .unwrap()
    }

    async fn transactions(&self) -> Vec<Transaction> {
        self.store.list_transactions(self.user).await.unwrap()
    }

    async fn expense(&self, amount: Decimal, status: TransactionStatus) -> TransactionId {
        let data = input(TransactionKind::Expense, amount, status, self.a, Some(self.groceries));
        self.engine
            .save_transaction(self.user, data, None, None)
            .await
            .unwrap()
            .transaction_ids[0]
    }

    async fn settle(&self, root_id: TransactionId, amount: Decimal) -> super::SettlementOutcome {
        self.engine
            .settle(self.user, settlement(root_id, amount, self.a), None)
            .await
            .unwrap()
    }

    async fn assert_consistent(&self) {
        let report = self.engine.verify_balances(self.user).await.unwrap();
        assert!(report.is_consistent(), "divergent balances: {:?}", report.divergences);
    }
}

async fn open(engine: &LedgerEngine, user: UserId, name: &str, initial: Decimal) -> AccountId {
    engine
        .create_account(
            user,
            NewAccount {
                name: name.to_string(),
                account_type: AccountType::Checking,
                color: None,
                initial_balance: initial,
            },
        )
        .await
        .unwrap()
        .id
}

fn settlement(root_id: TransactionId, amount: Decimal, account_id: AccountId) -> SettlementInput {
    SettlementInput {
        root_id,
        actual_amount: amount,
        payment_date: date(2026, 2, 10),
        account_id,
        payment_method: None,
        tags: vec![],
        observation: None,
        receipt_ref: None,
    }
}

#[tokio::test]
async fn test_paid_creation_applies_once_and_pending_not_at_all() {
    let fx = Fixture::new().await;
    fx.expense(dec!(40), TransactionStatus::Paid).await;
    fx.expense(dec!(25), TransactionStatus::Pending).await;

    assert_eq!(fx.balance(fx.a).await, dec!(960));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_settlement_threshold_flips_root() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100.00), TransactionStatus::Pending).await;

    let first = fx.settle(root, dec!(60.00)).await;
    assert_eq!(first.state, SettlementState::Partial);
    assert_eq!(first.remaining, dec!(40.00));

    let second = fx.settle(root, dec!(40.00)).await;
    assert_eq!(second.state, SettlementState::Paid);
    assert_eq!(second.remaining, Decimal::ZERO);

    let stored = fx.transactions().await;
    let parent = stored.iter().find(|t| t.id == root).unwrap();
    assert!(parent.is_paid());
    assert!(parent.payment_date.is_none());
    assert_eq!(stored.iter().filter(|t| t.parent_id == Some(root)).count(), 2);

    // Money left once, through the children.
    assert_eq!(fx.balance(fx.a).await, dec!(900.00));
    fx.assert_consistent().await;

    assert!(matches!(
        fx.engine.settle(fx.user, settlement(root, dec!(1), fx.a), None).await,
        Err(LedgerError::AlreadyPaid(_))
    ));
}

#[tokio::test]
async fn test_settlement_just_short_stays_partial() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100.00), TransactionStatus::Pending).await;
    fx.settle(root, dec!(60.00)).await;
    let outcome = fx.settle(root, dec!(39.98)).await;

    assert_eq!(outcome.state, SettlementState::Partial);
    assert_eq!(outcome.remaining, dec!(0.02));

    let ledger = fx.engine.list_ledger(fx.user).await.unwrap();
    let line = ledger.iter().find(|l| l.transaction.id == root).unwrap();
    assert_eq!(line.state, SettlementState::Partial);
    assert_eq!(line.paid_total, dec!(99.98));
    assert_eq!(line.children.len(), 2);
}

#[tokio::test]
async fn test_settling_a_child_is_rejected() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    let child = fx.settle(root, dec!(10)).await.child_id.unwrap();

    assert!(matches!(
        fx.engine.settle(fx.user, settlement(child, dec!(1), fx.a), None).await,
        Err(LedgerError::NotSettleable(_))
    ));
}

#[tokio::test]
async fn test_edit_moves_effect_between_accounts() {
    let fx = Fixture::new().await;
    let id = fx.expense(dec!(50.00), TransactionStatus::Paid).await;
    assert_eq!(fx.balance(fx.a).await, dec!(950.00));

    let mut edited = input(
        TransactionKind::Expense,
        dec!(80.00),
        TransactionStatus::Paid,
        fx.b,
        Some(fx.groceries),
    );
    edited.description = "Groceries (market)".to_string();
    let outcome = fx
        .engine
        .save_transaction(fx.user, edited, Some(id), None)
        .await
        .unwrap();

    assert_eq!(outcome.deltas.len(), 2);
    assert_eq!(fx.balance(fx.a).await, dec!(1000.00));
    assert_eq!(fx.balance(fx.b).await, dec!(420.00));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_edit_paid_to_pending_reverses() {
    let fx = Fixture::new().await;
    let id = fx.expense(dec!(50), TransactionStatus::Paid).await;
    let data = input(
        TransactionKind::Expense,
        dec!(50),
        TransactionStatus::Pending,
        fx.a,
        Some(fx.groceries),
    );
    fx.engine
        .save_transaction(fx.user, data, Some(id), None)
        .await
        .unwrap();

    assert_eq!(fx.balance(fx.a).await, dec!(1000));
    let stored = fx.transactions().await;
    assert!(stored[0].payment_date.is_none());
}

#[tokio::test]
async fn test_edit_rules_for_settled_roots() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    let child = fx.settle(root, dec!(60)).await.child_id.unwrap();

    let paid = input(
        TransactionKind::Expense,
        dec!(100),
        TransactionStatus::Paid,
        fx.a,
        Some(fx.groceries),
    );
    assert!(matches!(
        fx.engine.save_transaction(fx.user, paid.clone(), Some(root), None).await,
        Err(LedgerError::SettleRemainingInstead(_))
    ));
    assert!(matches!(
        fx.engine.save_transaction(fx.user, paid, Some(child), None).await,
        Err(LedgerError::ChildImmutable(_))
    ));

    // Lowering the amount to what was already paid completes the root.
    let lowered = input(
        TransactionKind::Expense,
        dec!(60),
        TransactionStatus::Pending,
        fx.a,
        Some(fx.groceries),
    );
    let outcome = fx
        .engine
        .save_transaction(fx.user, lowered, Some(root), None)
        .await
        .unwrap();
    assert!(outcome.deltas.is_empty());

    let stored = fx.transactions().await;
    assert!(stored.iter().find(|t| t.id == root).unwrap().is_paid());
    assert_eq!(fx.balance(fx.a).await, dec!(940));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_transfer_symmetry_and_delete_restores() {
    let fx = Fixture::new().await;
    let mut data = input(TransactionKind::Transfer, dec!(30.00), TransactionStatus::Paid, fx.a, None);
    data.to_account_id = Some(fx.b);
    let id = fx
        .engine
        .save_transaction(fx.user, data, None, None)
        .await
        .unwrap()
        .transaction_ids[0];

    assert_eq!(fx.balance(fx.a).await, dec!(970.00));
    assert_eq!(fx.balance(fx.b).await, dec!(530.00));

    let outcome = fx.engine.delete_transaction(fx.user, id, false, None).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { removed: vec![id] });
    assert_eq!(fx.balance(fx.a).await, dec!(1000.00));
    assert_eq!(fx.balance(fx.b).await, dec!(500.00));
}

#[tokio::test]
async fn test_forced_deletion() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    let child = fx.settle(root, dec!(30)).await.child_id.unwrap();
    assert_eq!(fx.balance(fx.a).await, dec!(970));

    let blocked = fx.engine.delete_transaction(fx.user, root, false, None).await.unwrap();
    assert_eq!(blocked, DeleteOutcome::Blocked { children: 1 });
    assert_eq!(fx.transactions().await.len(), 2);

    let deleted = fx.engine.delete_transaction(fx.user, root, true, None).await.unwrap();
    match deleted {
        DeleteOutcome::Deleted { removed } => {
            assert!(removed.contains(&root));
            assert!(removed.contains(&child));
        }
        other => panic!("forced delete did not run: {other:?}"),
    }
    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.balance(fx.a).await, dec!(1000));
}

#[tokio::test]
async fn test_deleting_a_settlement_reopens_root() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    fx.settle(root, dec!(60)).await;
    let last = fx.settle(root, dec!(40)).await.child_id.unwrap();

    fx.engine.delete_transaction(fx.user, last, false, None).await.unwrap();

    let stored = fx.transactions().await;
    assert!(stored.iter().find(|t| t.id == root).unwrap().is_pending());
    assert_eq!(fx.balance(fx.a).await, dec!(940));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_installments_via_engine() {
    let fx = Fixture::new().await;
    let mut data = input(
        TransactionKind::Expense,
        dec!(100.00),
        TransactionStatus::Paid,
        fx.a,
        Some(fx.groceries),
    );
    data.is_recurring = true;
    data.recurring_type = Some(RecurringType::Installment);
    data.recurrence_count = Some(3);

    let outcome = fx
        .engine
        .save_transaction(fx.user, data, None, None)
        .await
        .unwrap();
    assert_eq!(outcome.transaction_ids.len(), 3);

    let stored = fx.transactions().await;
    let total: Decimal = stored.iter().map(|t| t.amount).sum();
    assert_eq!(total, dec!(100.00));
    assert_eq!(stored.iter().filter(|t| t.is_paid()).count(), 1);
    assert_eq!(fx.balance(fx.a).await, dec!(966.67));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replayed_operation_applies_once() {
    let fx = Fixture::new().await;
    let op = OperationId::new();
    let data = input(
        TransactionKind::Income,
        dec!(250),
        TransactionStatus::Paid,
        fx.a,
        Some(fx.salary),
    );

    let first = fx
        .engine
        .save_transaction(fx.user, data.clone(), None, Some(op))
        .await
        .unwrap();
    let second = fx
        .engine
        .save_transaction(fx.user, data, None, Some(op))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert!(second.transaction_ids.is_empty());
    assert_eq!(fx.transactions().await.len(), 1);
    assert_eq!(fx.balance(fx.a).await, dec!(1250));
}

#[tokio::test]
async fn test_retried_closing_settlement_is_not_rejected() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    let op = OperationId::new();

    let first = fx
        .engine
        .settle(fx.user, settlement(root, dec!(100), fx.a), Some(op))
        .await
        .unwrap();
    assert_eq!(first.state, SettlementState::Paid);

    // The root is paid now, so planning the retry would fail with AlreadyPaid.
    let retry = fx
        .engine
        .settle(fx.user, settlement(root, dec!(100), fx.a), Some(op))
        .await
        .unwrap();
    assert!(retry.replayed);
    assert_eq!(retry.child_id, None);
    assert_eq!(retry.state, SettlementState::Paid);
    assert_eq!(retry.paid_total, dec!(100));
    assert_eq!(fx.transactions().await.len(), 2);
    assert_eq!(fx.balance(fx.a).await, dec!(900));

    // A fresh key still hits the paid root.
    assert!(matches!(
        fx.engine
            .settle(fx.user, settlement(root, dec!(100), fx.a), Some(OperationId::new()))
            .await,
        Err(LedgerError::AlreadyPaid(_))
    ));
}

#[tokio::test]
async fn test_replayed_delete_changes_nothing() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    fx.settle(root, dec!(40)).await;
    let op = OperationId::new();

    let first = fx
        .engine
        .delete_transaction(fx.user, root, true, Some(op))
        .await
        .unwrap();
    assert!(matches!(first, DeleteOutcome::Deleted { ref removed } if removed.len() == 2));
    assert_eq!(fx.balance(fx.a).await, dec!(1000));

    let retry = fx
        .engine
        .delete_transaction(fx.user, root, true, Some(op))
        .await
        .unwrap();
    assert_eq!(retry, DeleteOutcome::AlreadyApplied { operation_id: op });
    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.balance(fx.a).await, dec!(1000));

    // Without the key the root is simply gone.
    assert!(matches!(
        fx.engine.delete_transaction(fx.user, root, true, None).await,
        Err(LedgerError::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_settled_root_keeps_type_and_accounts() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;
    fx.settle(root, dec!(40)).await;

    let as_income = input(
        TransactionKind::Income,
        dec!(100),
        TransactionStatus::Pending,
        fx.a,
        Some(fx.salary),
    );
    let other_account = input(
        TransactionKind::Expense,
        dec!(100),
        TransactionStatus::Pending,
        fx.b,
        Some(fx.groceries),
    );
    let mut as_transfer = input(
        TransactionKind::Transfer,
        dec!(100),
        TransactionStatus::Pending,
        fx.a,
        None,
    );
    as_transfer.to_account_id = Some(fx.b);

    for edit in [as_income, other_account, as_transfer] {
        assert!(matches!(
            fx.engine.save_transaction(fx.user, edit, Some(root), None).await,
            Err(LedgerError::SettledRootLocked(_))
        ));
    }

    let stored = fx.transactions().await;
    let kept = stored.iter().find(|t| t.id == root).unwrap();
    assert_eq!(kept.kind, TransactionKind::Expense);
    assert_eq!(kept.account_id, fx.a);
    assert_eq!(fx.balance(fx.a).await, dec!(960));
    assert_eq!(fx.balance(fx.b).await, dec!(500));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_concurrent_settlements_are_serialized() {
    let fx = Fixture::new().await;
    let root = fx.expense(dec!(100), TransactionStatus::Pending).await;

    let (left, right) = tokio::join!(
        fx.engine.settle(fx.user, settlement(root, dec!(50), fx.a), None),
        fx.engine.settle(fx.user, settlement(root, dec!(50), fx.a), None),
    );
    let states = [left.unwrap().state, right.unwrap().state];
    assert!(states.contains(&SettlementState::Partial));
    assert!(states.contains(&SettlementState::Paid));
    assert_eq!(fx.balance(fx.a).await, dec!(900));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_validation_fails_before_any_write() {
    let fx = Fixture::new().await;
    let data = input(TransactionKind::Expense, dec!(10), TransactionStatus::Paid, fx.a, None);
    assert!(matches!(
        fx.engine.save_transaction(fx.user, data, None, None).await,
        Err(LedgerError::MissingCategory)
    ));
    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.balance(fx.a).await, dec!(1000));
}

#[tokio::test]
async fn test_dre_matches_cash_summary() {
    let fx = Fixture::new().await;
    let sale = input(
        TransactionKind::Income,
        dec!(1000),
        TransactionStatus::Paid,
        fx.a,
        Some(fx.salary),
    );
    fx.engine.save_transaction(fx.user, sale, None, None).await.unwrap();
    fx.expense(dec!(300), TransactionStatus::Paid).await;
    let open = fx.expense(dec!(200), TransactionStatus::Pending).await;
    fx.settle(open, dec!(50)).await;

    let january = DateRange::month(2026, 1).unwrap();
    let dre = fx.engine.dre(fx.user, january, Regime::Cash).await.unwrap();
    let summary = fx
        .engine
        .summarize(fx.user, Some(january), Regime::Cash)
        .await
        .unwrap();

    assert_eq!(dre.gross_revenue.value, dec!(1000));
    assert_eq!(dre.direct_costs.value, dec!(300));
    assert_eq!(dre.net_profit.value, summary.total_income - summary.total_expense);
    // The settlement was paid in February.
    assert_eq!(summary.pending_expense, dec!(150));
    assert_eq!(summary.total_balance, dec!(2150));
}

#[tokio::test]
async fn test_competence_dre_leaves_open_bills_out() {
    let fx = Fixture::new().await;
    let sale = input(
        TransactionKind::Income,
        dec!(1000),
        TransactionStatus::Paid,
        fx.a,
        Some(fx.salary),
    );
    fx.engine.save_transaction(fx.user, sale, None, None).await.unwrap();
    fx.expense(dec!(200), TransactionStatus::Pending).await;

    let january = DateRange::month(2026, 1).unwrap();
    let dre = fx.engine.dre(fx.user, january, Regime::Competence).await.unwrap();
    let summary = fx
        .engine
        .summarize(fx.user, Some(january), Regime::Competence)
        .await
        .unwrap();

    assert_eq!(dre.direct_costs.value, Decimal::ZERO);
    assert_eq!(dre.net_profit.value, dec!(1000));
    assert_eq!(dre.net_profit.value, summary.net_result);
    assert_eq!(summary.pending_expense, dec!(200));
}

#[tokio::test]
async fn test_verify_detects_drift() {
    let fx = Fixture::new().await;
    fx.expense(dec!(10), TransactionStatus::Paid).await;
    fx.store.force_balance(fx.user, fx.a, dec!(1000)).await;

    let report = fx.engine.verify_balances(fx.user).await.unwrap();
    assert_eq!(report.divergences.len(), 1);
    assert_eq!(report.divergences[0].difference, dec!(10));
    assert!(matches!(
        report.into_result(),
        Err(LedgerError::IntegrityViolation { count: 1 })
    ));
}

/// Store offering only CRUD, whose balance writes always fail.
struct FlakyStore {
    inner: InMemoryLedgerStore,
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_transactions(user).await
    }

    async fn create_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        self.inner.create_transaction(user, tx).await
    }

    async fn update_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        self.inner.update_transaction(user, tx).await
    }

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<(), StoreError> {
        self.inner.delete_transaction(user, id).await
    }

    async fn update_balance(
        &self,
        _user: UserId,
        _account_id: AccountId,
        _new_balance: Decimal,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("balance service timed out".to_string()))
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts(user).await
    }

    async fn create_account(&self, user: UserId, account: &Account) -> Result<(), StoreError> {
        self.inner.create_account(user, account).await
    }

    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, StoreError> {
        self.inner.list_categories(user).await
    }

    async fn create_category(&self, user: UserId, category: &Category) -> Result<(), StoreError> {
        self.inner.create_category(user, category).await
    }
}

#[tokio::test]
async fn test_partial_sequential_commit_is_a_reconciliation_failure() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryLedgerStore::new(),
    });
    let engine = LedgerEngine::new(store.clone(), LedgerSettings::default());
    let user = UserId::new();
    let a = open(&engine, user, "Checking", dec!(100)).await;
    let category = engine
        .create_category(
            user,
            NewCategory {
                name: "Rent".to_string(),
                kind: CategoryKind::Expense,
                dre_category: None,
            },
        )
        .await
        .unwrap();

    let data = input(
        TransactionKind::Expense,
        dec!(40),
        TransactionStatus::Paid,
        a,
        Some(category.id),
    );
    let err = engine
        .save_transaction(user, data, None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::ReconciliationFailure {
            applied: 1,
            total: 2,
            ..
        }
    ));
    assert!(!err.is_retryable());

    // The half-applied write is visible to the integrity check.
    let report = engine.verify_balances(user).await.unwrap();
    assert_eq!(report.divergences.len(), 1);
}

#[tokio::test]
async fn test_blank_names_are_rejected() {
    let fx = Fixture::new().await;
    let account = fx
        .engine
        .create_account(
            fx.user,
            NewAccount {
                name: "   ".to_string(),
                account_type: AccountType::Cash,
                color: None,
                initial_balance: Decimal::ZERO,
            },
        )
        .await;
    assert!(matches!(account, Err(LedgerError::MissingName)));

    let category = fx
        .engine
        .create_category(
            fx.user,
            NewCategory {
                name: String::new(),
                kind: CategoryKind::Income,
                dre_category: None,
            },
        )
        .await;
    assert!(matches!(category, Err(LedgerError::MissingName)));
    assert_eq!(fx.engine.list_accounts(fx.user).await.unwrap().len(), 2);
}
