//! Balance reconciliation.
//!
//! Translates transaction state changes into signed `(account, delta)` pairs,
//! and recomputes balances from the transaction log to detect drift.
//!
//! Sign rules (amounts are stored as positive magnitudes):
//! - Income: `+amount` on `account_id`
//! - Expense: `-amount` on `account_id`
//! - Transfer: `-amount` on `account_id`, `+amount` on `to_account_id`
//!
//! A transaction has a balance effect of its own only while it is paid and has
//! no settlement children. Once a root has children, the children carry the
//! effect, so a root flipped to paid by its settlements never moves money twice.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use saldo_shared::types::AccountId;

use super::index::SettlementIndex;
use super::types::{Account, Transaction, TransactionKind};

/// A signed change to one account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    /// The account to adjust.
    pub account_id: AccountId,
    /// Signed amount to add to the balance.
    pub amount: Decimal,
}

impl BalanceDelta {
    /// Creates a new delta.
    #[must_use]
    pub const fn new(account_id: AccountId, amount: Decimal) -> Self {
        Self { account_id, amount }
    }
}

/// The balance-relevant part of a transaction that has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedState {
    /// Income, expense or transfer.
    pub kind: TransactionKind,
    /// Positive magnitude.
    pub amount: Decimal,
    /// Source (or income target) account.
    pub account_id: AccountId,
    /// Transfer destination.
    pub to_account_id: Option<AccountId>,
}

impl AppliedState {
    /// Returns the applied state of `tx`, or `None` if it has no balance effect
    /// of its own (pending, or a root whose settlements carry the effect).
    #[must_use]
    pub fn of(tx: &Transaction, has_children: bool) -> Option<Self> {
        if !tx.is_paid() || has_children {
            return None;
        }
        Some(Self {
            kind: tx.kind,
            amount: tx.amount,
            account_id: tx.account_id,
            to_account_id: tx.to_account_id,
        })
    }

    /// The signed deltas this state contributes.
    #[must_use]
    pub fn deltas(&self) -> Vec<BalanceDelta> {
        match self.kind {
            TransactionKind::Income => vec![BalanceDelta::new(self.account_id, self.amount)],
            TransactionKind::Expense => vec![BalanceDelta::new(self.account_id, -self.amount)],
            TransactionKind::Transfer => {
                let mut deltas = vec![BalanceDelta::new(self.account_id, -self.amount)];
                if let Some(to) = self.to_account_id {
                    deltas.push(BalanceDelta::new(to, self.amount));
                }
                deltas
            }
        }
    }
}

/// Stateless service computing balance effects.
pub struct BalanceService;

impl BalanceService {
    /// Deltas to apply when `tx` is created (or marked paid) with no children.
    #[must_use]
    pub fn apply(tx: &Transaction) -> Vec<BalanceDelta> {
        AppliedState::of(tx, false)
            .map(|s| s.deltas())
            .unwrap_or_default()
    }

    /// Deltas that undo the effect of `tx`.
    #[must_use]
    pub fn reverse(tx: &Transaction, has_children: bool) -> Vec<BalanceDelta> {
        Self::transition(AppliedState::of(tx, has_children).as_ref(), None)
    }

    /// Minimal deltas moving balances from the `old` applied state to `new`.
    ///
    /// The old effect is reversed and the new one applied; deltas on the same
    /// account are netted and zero results dropped.
    #[must_use]
    pub fn transition(old: Option<&AppliedState>, new: Option<&AppliedState>) -> Vec<BalanceDelta> {
        let reversal = old.into_iter().flat_map(|s| {
            s.deltas()
                .into_iter()
                .map(|d| BalanceDelta::new(d.account_id, -d.amount))
        });
        let application = new.into_iter().flat_map(AppliedState::deltas);

        Self::net(reversal.chain(application))
    }

    /// Merges deltas per account, keeping first-appearance order and dropping zeros.
    #[must_use]
    pub fn net(deltas: impl IntoIterator<Item = BalanceDelta>) -> Vec<BalanceDelta> {
        let mut merged: Vec<BalanceDelta> = Vec::new();
        for delta in deltas {
            match merged.iter_mut().find(|m| m.account_id == delta.account_id) {
                Some(existing) => existing.amount += delta.amount,
                None => merged.push(delta),
            }
        }
        merged.retain(|d| !d.amount.is_zero());
        merged
    }

    /// Recomputes every account balance from its opening balance and the log.
    #[must_use]
    pub fn derive_balances(
        accounts: &[Account],
        transactions: &[Transaction],
    ) -> HashMap<AccountId, Decimal> {
        let index = SettlementIndex::build(transactions);
        let mut balances: HashMap<AccountId, Decimal> = accounts
            .iter()
            .map(|a| (a.id, a.initial_balance))
            .collect();

        for tx in transactions {
            let Some(state) = AppliedState::of(tx, index.has_children(tx.id)) else {
                continue;
            };
            for delta in state.deltas() {
                *balances.entry(delta.account_id).or_default() += delta.amount;
            }
        }

        balances
    }

    /// Compares stored balances against the derived view.
    #[must_use]
    pub fn verify(accounts: &[Account], transactions: &[Transaction]) -> IntegrityReport {
        let derived = Self::derive_balances(accounts, transactions);
        let divergences = accounts
            .iter()
            .filter_map(|account| {
                let expected = derived
                    .get(&account.id)
                    .copied()
                    .unwrap_or(account.initial_balance);
                (expected != account.balance).then(|| BalanceDivergence {
                    account_id: account.id,
                    stored: account.balance,
                    derived: expected,
                    difference: account.balance - expected,
                })
            })
            .collect();

        IntegrityReport {
            accounts_checked: accounts.len(),
            divergences,
        }
    }
}

/// One account whose stored balance disagrees with the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDivergence {
    /// The account.
    pub account_id: AccountId,
    /// Balance the store holds.
    pub stored: Decimal,
    /// Balance implied by the transaction log.
    pub derived: Decimal,
    /// `stored - derived`.
    pub difference: Decimal,
}

/// Result of checking stored balances against the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Number of accounts compared.
    pub accounts_checked: usize,
    /// Accounts that diverge.
    pub divergences: Vec<BalanceDivergence>,
}

impl IntegrityReport {
    /// Returns true if no account diverges.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }

    /// Converts a divergent report into an integrity error.
    pub fn into_result(self) -> Result<Self, super::error::LedgerError> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(super::error::LedgerError::IntegrityViolation {
                count: self.divergences.len(),
            })
        }
    }
}
