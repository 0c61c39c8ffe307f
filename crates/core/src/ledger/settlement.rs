//! Settlement ("baixa") of pending roots.
//!
//! Settling records a paid child under a pending root. Children carry the
//! balance effect; once their paid total reaches the root amount (within the
//! configured epsilon) the root is flipped to paid without moving money again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use saldo_shared::types::TransactionId;
use saldo_shared::types::money::{covers, non_negative};

use super::balance::{BalanceDelta, BalanceService};
use super::error::LedgerError;
use super::index::{LedgerSnapshot, SettlementIndex};
use super::types::{SettlementInput, SettlementState, Transaction, TransactionStatus};
use super::validation::{validate_account, validate_amount};

/// Result of a settlement, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// The settled root.
    pub root_id: TransactionId,
    /// The child created for this payment; `None` when the call was a replay.
    pub child_id: Option<TransactionId>,
    /// Root state after the payment.
    pub state: SettlementState,
    /// Sum of all paid children.
    pub paid_total: Decimal,
    /// Amount still open, never negative.
    pub remaining: Decimal,
    /// True if the store had already applied this operation.
    pub replayed: bool,
}

/// Writes a settlement needs, computed before anything is persisted.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    /// Child to insert.
    pub child: Transaction,
    /// Root flipped to paid, if the payment completes it.
    pub root_update: Option<Transaction>,
    /// Balance effect of the child.
    pub deltas: Vec<BalanceDelta>,
    /// Children the root had when the plan was made.
    pub expected_children: usize,
    /// What the caller gets back.
    pub outcome: SettlementOutcome,
}

/// Stored status a root should have given its paid children total.
#[must_use]
pub fn status_for(target: Decimal, paid_total: Decimal, epsilon: Decimal) -> TransactionStatus {
    if covers(paid_total, target, epsilon) {
        TransactionStatus::Paid
    } else {
        TransactionStatus::Pending
    }
}

/// Amount considered realized for a root.
#[must_use]
pub fn effective_realized(root: &Transaction, index: &SettlementIndex<'_>) -> Decimal {
    if root.is_paid() {
        root.amount
    } else {
        index.paid_total(root.id)
    }
}

/// `max(0, amount - effective_realized)`.
#[must_use]
pub fn remaining(root: &Transaction, index: &SettlementIndex<'_>) -> Decimal {
    non_negative(root.amount - effective_realized(root, index))
}

/// Derived settlement state of a root.
#[must_use]
pub fn settlement_state(root: &Transaction, index: &SettlementIndex<'_>) -> SettlementState {
    if root.is_paid() {
        SettlementState::Paid
    } else if index.paid_total(root.id) > Decimal::ZERO {
        SettlementState::Partial
    } else {
        SettlementState::Pending
    }
}

/// Plans the settlement of `input.root_id` against `snapshot`.
///
/// # Errors
///
/// Rejects unknown roots and accounts, children, already paid roots,
/// non-positive amounts, and transfers settled into their own destination.
pub fn plan(
    snapshot: &LedgerSnapshot,
    input: &SettlementInput,
    epsilon: Decimal,
    now: DateTime<Utc>,
) -> Result<SettlementPlan, LedgerError> {
    let index = snapshot.index();
    let root = index
        .get(input.root_id)
        .ok_or(LedgerError::TransactionNotFound(input.root_id))?;

    if root.is_child() {
        return Err(LedgerError::NotSettleable(root.id));
    }
    if root.is_paid() {
        return Err(LedgerError::AlreadyPaid(root.id));
    }
    validate_amount(input.actual_amount)?;
    validate_account(snapshot, input.account_id)?;
    if root.to_account_id == Some(input.account_id) {
        return Err(LedgerError::SameAccountTransfer);
    }

    let child = Transaction {
        id: TransactionId::new(),
        description: root.description.clone(),
        amount: input.actual_amount,
        date: input.payment_date,
        payment_date: Some(input.payment_date),
        kind: root.kind,
        status: TransactionStatus::Paid,
        account_id: input.account_id,
        to_account_id: root.to_account_id,
        category_id: root.category_id,
        parent_id: Some(root.id),
        is_recurring: false,
        recurring_type: None,
        installment_current: None,
        installment_total: None,
        payment_method: input.payment_method.clone(),
        tags: input.tags.clone(),
        observation: input.observation.clone(),
        receipt_ref: input.receipt_ref.clone(),
        created_at: now,
        updated_at: now,
    };

    let paid_total = index.paid_total(root.id) + child.amount;
    let root_update = (status_for(root.amount, paid_total, epsilon) == TransactionStatus::Paid)
        .then(|| Transaction {
            status: TransactionStatus::Paid,
            updated_at: now,
            ..root.clone()
        });

    let (state, open) = if root_update.is_some() {
        (SettlementState::Paid, Decimal::ZERO)
    } else {
        (SettlementState::Partial, non_negative(root.amount - paid_total))
    };

    Ok(SettlementPlan {
        deltas: BalanceService::apply(&child),
        expected_children: index.children_of(root.id).len(),
        outcome: SettlementOutcome {
            root_id: root.id,
            child_id: Some(child.id),
            state,
            paid_total,
            remaining: open,
            replayed: false,
        },
        child,
        root_update,
    })
}
