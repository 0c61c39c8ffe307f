//! In-memory [`LedgerStore`], used by tests and by the server when no
//! database is configured.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, OperationId, TransactionId, UserId};
use tokio::sync::RwLock;

use super::store::{CommitGuard, CommitReceipt, LedgerCommit, LedgerOp, LedgerStore, StoreError};
use super::types::{Account, Category, Transaction};

#[derive(Debug, Clone, Default)]
struct Book {
    accounts: Vec<Account>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
    /// Every operation id ever committed. Never pruned, so it grows with the
    /// number of commits for the lifetime of the store.
    applied: HashSet<OperationId>,
}

impl Book {
    fn insert(&mut self, tx: &Transaction) {
        self.transactions.push(tx.clone());
    }

    fn replace(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        let slot = self
            .transactions
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {}", tx.id)))?;
        *slot = tx.clone();
        Ok(())
    }

    fn remove(&mut self, id: TransactionId) -> Result<(), StoreError> {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.id != id);
        if self.transactions.len() == before {
            return Err(StoreError::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, StoreError> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    fn check(&self, guard: &CommitGuard) -> Result<(), StoreError> {
        match guard {
            CommitGuard::Version {
                transaction_id,
                updated_at,
            } => {
                let current = self
                    .transactions
                    .iter()
                    .find(|t| t.id == *transaction_id)
                    .ok_or_else(|| StoreError::GuardFailed(format!("transaction {transaction_id} is gone")))?;
                if current.updated_at != *updated_at {
                    return Err(StoreError::GuardFailed(format!(
                        "transaction {transaction_id} changed"
                    )));
                }
            }
            CommitGuard::ChildCount { root_id, expected } => {
                let actual = self
                    .transactions
                    .iter()
                    .filter(|t| t.parent_id == Some(*root_id))
                    .count();
                if actual != *expected {
                    return Err(StoreError::GuardFailed(format!(
                        "root {root_id} has {actual} settlements, expected {expected}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &LedgerOp) -> Result<(), StoreError> {
        match op {
            LedgerOp::InsertTransaction(tx) => {
                self.insert(tx);
                Ok(())
            }
            LedgerOp::UpdateTransaction(tx) => self.replace(tx),
            LedgerOp::DeleteTransaction(id) => self.remove(*id),
            LedgerOp::AdjustBalance(delta) => {
                self.account_mut(delta.account_id)?.balance += delta.amount;
                Ok(())
            }
        }
    }
}

/// Thread-safe, per-user store held in process memory.
///
/// Commits are atomic (applied to a copy under one write lock, then swapped
/// in) and idempotent per operation id. Applied ids are remembered until the
/// store is dropped, which suits tests and short-lived single-process use
/// but not a long-running server.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    books: RwLock<HashMap<UserId, Book>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a stored balance without touching transactions.
    ///
    /// Lets tests simulate drift for integrity checks.
    pub async fn force_balance(&self, user: UserId, account_id: AccountId, balance: Decimal) {
        if let Some(account) = self
            .books
            .write()
            .await
            .get_mut(&user)
            .and_then(|book| book.accounts.iter_mut().find(|a| a.id == account_id))
        {
            account.balance = balance;
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .books
            .read()
            .await
            .get(&user)
            .map(|b| b.transactions.clone())
            .unwrap_or_default())
    }

    async fn create_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        self.books.write().await.entry(user).or_default().insert(tx);
        Ok(())
    }

    async fn update_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        self.books.write().await.entry(user).or_default().replace(tx)
    }

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<(), StoreError> {
        self.books.write().await.entry(user).or_default().remove(id)
    }

    async fn update_balance(
        &self,
        user: UserId,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        self.books
            .write()
            .await
            .entry(user)
            .or_default()
            .account_mut(account_id)?
            .balance = new_balance;
        Ok(())
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .books
            .read()
            .await
            .get(&user)
            .map(|b| b.accounts.clone())
            .unwrap_or_default())
    }

    async fn create_account(&self, user: UserId, account: &Account) -> Result<(), StoreError> {
        self.books
            .write()
            .await
            .entry(user)
            .or_default()
            .accounts
            .push(account.clone());
        Ok(())
    }

    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, StoreError> {
        Ok(self
            .books
            .read()
            .await
            .get(&user)
            .map(|b| b.categories.clone())
            .unwrap_or_default())
    }

    async fn create_category(&self, user: UserId, category: &Category) -> Result<(), StoreError> {
        self.books
            .write()
            .await
            .entry(user)
            .or_default()
            .categories
            .push(category.clone());
        Ok(())
    }

    async fn is_applied(&self, user: UserId, operation_id: OperationId) -> Result<bool, StoreError> {
        Ok(self
            .books
            .read()
            .await
            .get(&user)
            .is_some_and(|book| book.applied.contains(&operation_id)))
    }

    async fn commit(&self, user: UserId, commit: LedgerCommit) -> Result<CommitReceipt, StoreError> {
        let mut books = self.books.write().await;
        let book = books.entry(user).or_default();

        if book.applied.contains(&commit.operation_id) {
            return Ok(CommitReceipt {
                operation_id: commit.operation_id,
                replayed: true,
            });
        }

        for guard in &commit.guards {
            book.check(guard)?;
        }

        let mut next = book.clone();
        for op in &commit.ops {
            next.apply(op)?;
        }
        next.applied.insert(commit.operation_id);
        *book = next;

        Ok(CommitReceipt {
            operation_id: commit.operation_id,
            replayed: false,
        })
    }
}
