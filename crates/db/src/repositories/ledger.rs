//! Postgres implementation of the ledger store.
//!
//! Every ledger operation arrives as one [`LedgerCommit`] and is applied in a
//! single database transaction: the replay check, the guards, the row writes,
//! the balance adjustments and the applied-operation marker either all land
//! or none do. Balances are adjusted in SQL (`balance = balance + delta`) so
//! concurrent writers never overwrite each other's deltas.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use saldo_core::ledger::{
    Account, BalanceDelta, Category, CommitGuard, CommitReceipt, LedgerCommit, LedgerOp,
    LedgerStore, StoreError, Transaction,
};
use saldo_shared::types::{AccountId, OperationId, TransactionId, UserId};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::mapping::{
    MappingError, account_from_model, account_to_active, category_from_model,
    category_to_active, transaction_from_model, transaction_to_active,
};
use crate::entities::{accounts, applied_operations, categories, transactions};

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Stored data the domain cannot represent.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Row not found (or owned by another user).
    #[error("{0} not found")]
    NotFound(String),

    /// A commit guard no longer holds.
    #[error("{0}")]
    GuardFailed(String),
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            RepositoryError::GuardFailed(reason) => Self::GuardFailed(reason),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Ledger store backed by Postgres.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn insert_transaction<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        tx: &Transaction,
    ) -> Result<(), RepositoryError> {
        transaction_to_active(user, tx)?.insert(conn).await?;
        Ok(())
    }

    async fn replace_transaction<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        tx: &Transaction,
    ) -> Result<(), RepositoryError> {
        let mut active = transaction_to_active(user, tx)?;
        // Ownership is part of the key; the row never moves between users.
        active.user_id = sea_orm::ActiveValue::Unchanged(user.into_inner());
        let result = transactions::Entity::update_many()
            .set(active)
            .filter(transactions::Column::Id.eq(tx.id.into_inner()))
            .filter(transactions::Column::UserId.eq(user.into_inner()))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {}", tx.id)));
        }
        Ok(())
    }

    async fn remove_transaction<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        id: TransactionId,
    ) -> Result<(), RepositoryError> {
        let result = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(id.into_inner()))
            .filter(transactions::Column::UserId.eq(user.into_inner()))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("transaction {id}")));
        }
        Ok(())
    }

    async fn adjust_balance<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        delta: BalanceDelta,
    ) -> Result<(), RepositoryError> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(delta.amount),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(accounts::Column::Id.eq(delta.account_id.into_inner()))
            .filter(accounts::Column::UserId.eq(user.into_inner()))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!(
                "account {}",
                delta.account_id
            )));
        }
        Ok(())
    }

    /// Re-checks a guard, locking the guarded row until the commit ends.
    async fn check_guard<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        guard: &CommitGuard,
    ) -> Result<(), RepositoryError> {
        match guard {
            CommitGuard::Version {
                transaction_id,
                updated_at,
            } => {
                let row = Self::lock_transaction(conn, user, *transaction_id).await?;
                if row.updated_at.with_timezone(&Utc) != *updated_at {
                    return Err(RepositoryError::GuardFailed(format!(
                        "transaction {transaction_id} changed since it was read"
                    )));
                }
            }
            CommitGuard::ChildCount { root_id, expected } => {
                Self::lock_transaction(conn, user, *root_id).await?;
                let children = transactions::Entity::find()
                    .filter(transactions::Column::ParentId.eq(root_id.into_inner()))
                    .filter(transactions::Column::UserId.eq(user.into_inner()))
                    .count(conn)
                    .await?;
                if usize::try_from(children).ok() != Some(*expected) {
                    return Err(RepositoryError::GuardFailed(format!(
                        "transaction {root_id} has {children} settlements, expected {expected}"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn lock_transaction<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        id: TransactionId,
    ) -> Result<transactions::Model, RepositoryError> {
        transactions::Entity::find_by_id(id.into_inner())
            .filter(transactions::Column::UserId.eq(user.into_inner()))
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))
    }

    async fn apply_commit(
        &self,
        user: UserId,
        commit: &LedgerCommit,
    ) -> Result<CommitReceipt, RepositoryError> {
        let txn = self.db.begin().await?;

        // A replay racing the first attempt fails on the marker's primary key
        // below and rolls back.
        let already = applied_operations::Entity::find_by_id(commit.operation_id.into_inner())
            .one(&txn)
            .await?;
        if already.is_some() {
            txn.rollback().await?;
            debug!(operation_id = %commit.operation_id, "Operation already applied");
            return Ok(CommitReceipt {
                operation_id: commit.operation_id,
                replayed: true,
            });
        }

        for guard in &commit.guards {
            Self::check_guard(&txn, user, guard).await?;
        }

        for op in &commit.ops {
            match op {
                LedgerOp::InsertTransaction(tx) => Self::insert_transaction(&txn, user, tx).await?,
                LedgerOp::UpdateTransaction(tx) => {
                    Self::replace_transaction(&txn, user, tx).await?;
                }
                LedgerOp::DeleteTransaction(id) => Self::remove_transaction(&txn, user, *id).await?,
                LedgerOp::AdjustBalance(delta) => Self::adjust_balance(&txn, user, *delta).await?,
            }
        }

        applied_operations::ActiveModel {
            operation_id: Set(commit.operation_id.into_inner()),
            user_id: Set(user.into_inner()),
            applied_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        Ok(CommitReceipt {
            operation_id: commit.operation_id,
            replayed: false,
        })
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>, StoreError> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user.into_inner()))
            .order_by_desc(transactions::Column::Date)
            .all(&self.db)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter()
            .map(|row| transaction_from_model(row).map_err(|e| RepositoryError::from(e).into()))
            .collect()
    }

    async fn create_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        Ok(Self::insert_transaction(&self.db, user, tx).await?)
    }

    async fn update_transaction(&self, user: UserId, tx: &Transaction) -> Result<(), StoreError> {
        Ok(Self::replace_transaction(&self.db, user, tx).await?)
    }

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<(), StoreError> {
        Ok(Self::remove_transaction(&self.db, user, id).await?)
    }

    async fn update_balance(
        &self,
        user: UserId,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Balance, Expr::value(new_balance))
            .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(accounts::Column::Id.eq(account_id.into_inner()))
            .filter(accounts::Column::UserId.eq(user.into_inner()))
            .exec(&self.db)
            .await
            .map_err(RepositoryError::from)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }
        Ok(())
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<Account>, StoreError> {
        let rows = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user.into_inner()))
            .order_by_asc(accounts::Column::Name)
            .all(&self.db)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter()
            .map(|row| account_from_model(row).map_err(|e| RepositoryError::from(e).into()))
            .collect()
    }

    async fn create_account(&self, user: UserId, account: &Account) -> Result<(), StoreError> {
        account_to_active(user, account)
            .insert(&self.db)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, StoreError> {
        let rows = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user.into_inner()))
            .order_by_asc(categories::Column::Name)
            .all(&self.db)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter()
            .map(|row| category_from_model(row).map_err(|e| RepositoryError::from(e).into()))
            .collect()
    }

    async fn create_category(&self, user: UserId, category: &Category) -> Result<(), StoreError> {
        category_to_active(user, category)
            .insert(&self.db)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn is_applied(&self, user: UserId, operation_id: OperationId) -> Result<bool, StoreError> {
        let marker = applied_operations::Entity::find_by_id(operation_id.into_inner())
            .filter(applied_operations::Column::UserId.eq(user.into_inner()))
            .one(&self.db)
            .await
            .map_err(RepositoryError::from)?;
        Ok(marker.is_some())
    }

    async fn commit(&self, user: UserId, commit: LedgerCommit) -> Result<CommitReceipt, StoreError> {
        match self.apply_commit(user, &commit).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                // The database transaction was dropped, so nothing landed.
                warn!(
                    user_id = %user,
                    operation_id = %commit.operation_id,
                    error = %err,
                    "Ledger commit rolled back"
                );
                Err(err.into())
            }
        }
    }
}
