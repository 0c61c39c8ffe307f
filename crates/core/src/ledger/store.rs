//! Persistence seam for the ledger engine.
//!
//! The engine talks to storage only through [`LedgerStore`]. The CRUD methods
//! mirror what a plain per-user record service offers; [`LedgerStore::commit`]
//! groups every write of one logical operation so that stores able to do so
//! can apply them atomically and recognise a replayed operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use saldo_shared::types::{AccountId, OperationId, TransactionId, UserId};
use thiserror::Error;

use super::balance::BalanceDelta;
use super::types::{Account, Category, Transaction};

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record the write refers to does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A commit guard no longer holds.
    #[error("guard failed: {0}")]
    GuardFailed(String),

    /// Sequential application stopped after some writes landed.
    #[error("operation {operation_id} stopped after {applied} of {total} writes: {reason}")]
    PartialCommit {
        /// The operation that broke.
        operation_id: OperationId,
        /// Writes already applied.
        applied: usize,
        /// Writes in the operation.
        total: usize,
        /// Underlying failure.
        reason: String,
    },
}

/// One write inside a [`LedgerCommit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Insert a new transaction.
    InsertTransaction(Transaction),
    /// Replace an existing transaction.
    UpdateTransaction(Transaction),
    /// Remove a transaction.
    DeleteTransaction(TransactionId),
    /// Add a signed delta to an account balance.
    AdjustBalance(BalanceDelta),
}

/// Precondition re-checked by the store before applying a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitGuard {
    /// The transaction must still carry this `updated_at`.
    Version {
        /// Guarded transaction.
        transaction_id: TransactionId,
        /// Version read by the engine.
        updated_at: DateTime<Utc>,
    },
    /// The root must still have exactly this many settlement children.
    ChildCount {
        /// Guarded root.
        root_id: TransactionId,
        /// Child count read by the engine.
        expected: usize,
    },
}

/// All writes of one logical ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCommit {
    /// Idempotency key.
    pub operation_id: OperationId,
    /// Preconditions.
    pub guards: Vec<CommitGuard>,
    /// Writes, in application order.
    pub ops: Vec<LedgerOp>,
}

impl LedgerCommit {
    /// Starts an empty commit for `operation_id`.
    #[must_use]
    pub fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            guards: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Adds a guard.
    pub fn guard(&mut self, guard: CommitGuard) {
        self.guards.push(guard);
    }

    /// Appends a write.
    pub fn push(&mut self, op: LedgerOp) {
        self.ops.push(op);
    }

    /// Appends one balance adjustment per delta.
    pub fn adjust(&mut self, deltas: impl IntoIterator<Item = BalanceDelta>) {
        self.ops.extend(deltas.into_iter().map(LedgerOp::AdjustBalance));
    }

    /// Returns every balance delta in the commit.
    #[must_use]
    pub fn deltas(&self) -> Vec<BalanceDelta> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                LedgerOp::AdjustBalance(delta) => Some(*delta),
                _ => None,
            })
            .collect()
    }
}

/// Acknowledgement of an applied commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// The applied operation.
    pub operation_id: OperationId,
    /// True if the store had already applied this operation and did nothing.
    pub replayed: bool,
}

/// Per-user persistence used by the ledger engine.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Lists every transaction of `user`, roots and children.
    async fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>, StoreError>;

    /// Inserts a transaction.
    async fn create_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError>;

    /// Replaces a transaction.
    async fn update_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError>;

    /// Deletes a transaction.
    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<(), StoreError>;

    /// Overwrites an account balance.
    async fn update_balance(
        &self,
        user: UserId,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Lists the accounts of `user`.
    async fn list_accounts(&self, user: UserId) -> Result<Vec<Account>, StoreError>;

    /// Inserts an account.
    async fn create_account(&self, user: UserId, account: &Account) -> Result<(), StoreError>;

    /// Lists the categories of `user`.
    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, StoreError>;

    /// Inserts a category.
    async fn create_category(&self, user: UserId, category: &Category) -> Result<(), StoreError>;

    /// True if a commit under `operation_id` was already applied for `user`.
    ///
    /// Stores that keep no record of applied operations answer `false`.
    async fn is_applied(&self, _user: UserId, _operation_id: OperationId) -> Result<bool, StoreError> {
        Ok(false)
    }

    /// Applies a commit.
    ///
    /// The default applies the writes one by one through the CRUD methods.
    /// It is neither atomic nor idempotent, and does not check guards (the
    /// engine's per-user lock is the only protection). A failure after the
    /// first write is reported as [`StoreError::PartialCommit`].
    async fn commit(&self, user: UserId, commit: LedgerCommit) -> Result<CommitReceipt, StoreError> {
        let total = commit.ops.len();
        let mut balances = if commit.deltas().is_empty() {
            Vec::new()
        } else {
            self.list_accounts(user).await?
        };

        for (applied, op) in commit.ops.iter().enumerate() {
            let result = match op {
                LedgerOp::InsertTransaction(tx) => self.create_transaction(user, tx).await,
                LedgerOp::UpdateTransaction(tx) => self.update_transaction(user, tx).await,
                LedgerOp::DeleteTransaction(id) => self.delete_transaction(user, *id).await,
                LedgerOp::AdjustBalance(delta) => {
                    match balances.iter_mut().find(|a| a.id == delta.account_id) {
                        Some(account) => {
                            let next = account.balance + delta.amount;
                            let written = self.update_balance(user, account.id, next).await;
                            if written.is_ok() {
                                account.balance = next;
                            }
                            written
                        }
                        None => Err(StoreError::NotFound(format!(
                            "account {}",
                            delta.account_id
                        ))),
                    }
                }
            };

            if let Err(err) = result {
                if applied == 0 {
                    return Err(err);
                }
                return Err(StoreError::PartialCommit {
                    operation_id: commit.operation_id,
                    applied,
                    total,
                    reason: err.to_string(),
                });
            }
        }

        Ok(CommitReceipt {
            operation_id: commit.operation_id,
            replayed: false,
        })
    }
}
