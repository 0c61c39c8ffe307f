//! Parent/child index over a transaction set.
//!
//! Settlement children point at their root through `parent_id`. Every read path
//! (aggregation, settlement, deletion) needs the reverse direction, so the index
//! is built once per snapshot instead of scanning the whole set per lookup.

use std::collections::HashMap;

use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CategoryId, TransactionId};

use super::types::{Account, Category, Transaction};

/// `root_id -> [children]` index plus lookup by ID.
#[derive(Debug, Default)]
pub struct SettlementIndex<'a> {
    by_id: HashMap<TransactionId, &'a Transaction>,
    children: HashMap<TransactionId, Vec<&'a Transaction>>,
}

impl<'a> SettlementIndex<'a> {
    /// Builds the index from a flat transaction list.
    ///
    /// Children are kept in `(date, id)` order so iteration is deterministic
    /// whatever order the store returned them in.
    #[must_use]
    pub fn build(transactions: &'a [Transaction]) -> Self {
        let mut by_id = HashMap::with_capacity(transactions.len());
        let mut children: HashMap<TransactionId, Vec<&'a Transaction>> = HashMap::new();

        for tx in transactions {
            by_id.insert(tx.id, tx);
            if let Some(parent) = tx.parent_id {
                children.entry(parent).or_default().push(tx);
            }
        }
        for list in children.values_mut() {
            list.sort_by_key(|c| (c.date, c.id));
        }

        Self { by_id, children }
    }

    /// Looks up a transaction.
    #[must_use]
    pub fn get(&self, id: TransactionId) -> Option<&'a Transaction> {
        self.by_id.get(&id).copied()
    }

    /// Settlement children of `root_id` (empty if none).
    #[must_use]
    pub fn children_of(&self, root_id: TransactionId) -> &[&'a Transaction] {
        self.children.get(&root_id).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `root_id` has at least one settlement child.
    #[must_use]
    pub fn has_children(&self, root_id: TransactionId) -> bool {
        self.children
            .get(&root_id)
            .is_some_and(|list| !list.is_empty())
    }

    /// Sum of paid children amounts for `root_id`.
    #[must_use]
    pub fn paid_total(&self, root_id: TransactionId) -> Decimal {
        self.children_of(root_id)
            .iter()
            .filter(|c| c.is_paid())
            .map(|c| c.amount)
            .sum()
    }
}

/// Point-in-time copy of one user's ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    /// All accounts.
    pub accounts: Vec<Account>,
    /// All categories.
    pub categories: Vec<Category>,
    /// All transactions, roots and children.
    pub transactions: Vec<Transaction>,
}

impl LedgerSnapshot {
    /// Builds the parent/child index for this snapshot.
    #[must_use]
    pub fn index(&self) -> SettlementIndex<'_> {
        SettlementIndex::build(&self.transactions)
    }

    /// Looks up an account.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Looks up a category.
    #[must_use]
    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Looks up a transaction.
    #[must_use]
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }
}
