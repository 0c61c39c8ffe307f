//! Ledger engine: the operations callers use.
//!
//! Each mutating call loads a snapshot, plans every write up front (so
//! validation fails before anything is persisted), and hands the writes to the
//! store as one [`LedgerCommit`]. Mutations of one user are serialized by an
//! async mutex; the commit guards catch writers outside this process.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use saldo_shared::LedgerConfig;
use saldo_shared::types::{OperationId, TransactionId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::balance::{AppliedState, BalanceDelta, BalanceService, IntegrityReport};
use super::error::{ErrorKind, LedgerError};
use super::index::LedgerSnapshot;
use super::recurrence::{self, RecurrencePolicy};
use super::settlement::{self, SettlementOutcome, status_for};
use super::store::{CommitGuard, CommitReceipt, LedgerCommit, LedgerOp, LedgerStore};
use super::types::{
    Account, Category, NewAccount, NewCategory, SettlementInput, SettlementState, Transaction,
    TransactionInput, TransactionStatus,
};
use super::validation::validate_input;
use crate::reports::{DateRange, DreReport, FinancialSummary, Regime, ReportService};

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Slack when comparing settled totals with a root amount.
    pub settlement_epsilon: Decimal,
    /// Occurrences of a FIXED entry without an explicit count.
    pub fixed_horizon_months: u32,
    /// Maximum installments per entry.
    pub max_installments: u32,
}

impl From<&LedgerConfig> for LedgerSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            settlement_epsilon: config.settlement_epsilon,
            fixed_horizon_months: config.fixed_horizon_months,
            max_installments: config.max_installments,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl LedgerSettings {
    fn recurrence(&self) -> RecurrencePolicy {
        RecurrencePolicy {
            fixed_horizon_months: self.fixed_horizon_months,
            max_installments: self.max_installments,
        }
    }
}

/// Result of creating or editing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Idempotency key the writes were committed under.
    pub operation_id: OperationId,
    /// Transactions written; empty on replay.
    pub transaction_ids: Vec<TransactionId>,
    /// Balance changes applied; empty on replay.
    pub deltas: Vec<BalanceDelta>,
    /// True if the store had already applied this operation.
    pub replayed: bool,
}

impl SaveOutcome {
    fn replayed(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            transaction_ids: Vec::new(),
            deltas: Vec::new(),
            replayed: true,
        }
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The transaction (and, when forced, its settlements) is gone.
    Deleted {
        /// Every removed transaction.
        removed: Vec<TransactionId>,
    },
    /// The root has settlements and `force` was not set. Nothing changed.
    Blocked {
        /// Number of settlements that block the delete.
        children: usize,
    },
    /// A delete with this idempotency key already ran. Nothing changed.
    AlreadyApplied {
        /// The earlier operation.
        operation_id: OperationId,
    },
}

/// A root with its derived settlement view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// The root.
    pub transaction: Transaction,
    /// Derived state.
    pub state: SettlementState,
    /// Sum of paid settlements.
    pub paid_total: Decimal,
    /// Open amount, never negative.
    pub remaining: Decimal,
    /// Settlements, oldest first.
    pub children: Vec<Transaction>,
}

/// Transaction ledger and settlement engine.
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    settings: LedgerSettings,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl LedgerEngine {
    /// Creates an engine on top of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            settings,
            locks: DashMap::new(),
        }
    }

    /// Engine tunables.
    #[must_use]
    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(user).or_default().value())
    }

    /// Loads every account, category and transaction of `user`.
    pub async fn snapshot(&self, user: UserId) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot {
            accounts: self.store.list_accounts(user).await?,
            categories: self.store.list_categories(user).await?,
            transactions: self.store.list_transactions(user).await?,
        })
    }

    /// Returns `operation_id` if the store already holds its writes.
    ///
    /// Checked before planning so that a retry is answered from the current
    /// state instead of being re-validated against it.
    async fn already_applied(
        &self,
        user: UserId,
        operation_id: Option<OperationId>,
    ) -> Result<Option<OperationId>, LedgerError> {
        let Some(operation_id) = operation_id else {
            return Ok(None);
        };
        if !self.store.is_applied(user, operation_id).await? {
            return Ok(None);
        }
        info!(user_id = %user, operation_id = %operation_id, "Ledger operation already applied");
        Ok(Some(operation_id))
    }

    async fn commit(&self, user: UserId, commit: LedgerCommit) -> Result<CommitReceipt, LedgerError> {
        let operation_id = commit.operation_id;
        let writes = commit.ops.len();

        match self.store.commit(user, commit).await {
            Ok(receipt) if receipt.replayed => {
                info!(user_id = %user, operation_id = %operation_id, "Ledger operation already applied");
                Ok(receipt)
            }
            Ok(receipt) => {
                debug!(user_id = %user, operation_id = %operation_id, writes, "Ledger operation committed");
                Ok(receipt)
            }
            Err(e) => {
                let err = LedgerError::from(e);
                match err.kind() {
                    ErrorKind::Reconciliation => error!(
                        user_id = %user,
                        operation_id = %operation_id,
                        error = %err,
                        "Ledger operation partially applied, balances need reconciliation"
                    ),
                    ErrorKind::Conflict => {
                        warn!(user_id = %user, operation_id = %operation_id, error = %err, "Ledger commit guard failed");
                    }
                    _ => error!(user_id = %user, operation_id = %operation_id, error = %err, "Ledger commit failed"),
                }
                Err(err)
            }
        }
    }

    /// Creates (`editing_id = None`) or edits a transaction.
    ///
    /// Creation expands recurring input into its series and applies the
    /// effect of the paid occurrence. Editing reverses the old effect and
    /// applies the new one; a root with settlements keeps no effect of its
    /// own and its status follows its settlements.
    pub async fn save_transaction(
        &self,
        user: UserId,
        input: TransactionInput,
        editing_id: Option<TransactionId>,
        operation_id: Option<OperationId>,
    ) -> Result<SaveOutcome, LedgerError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        if let Some(applied) = self.already_applied(user, operation_id).await? {
            return Ok(SaveOutcome::replayed(applied));
        }

        let snapshot = self.snapshot(user).await?;
        let mut commit = LedgerCommit::new(operation_id.unwrap_or_default());

        let ids = match editing_id {
            None => self.plan_create(&snapshot, &input, &mut commit)?,
            Some(id) => self.plan_edit(&snapshot, &input, id, &mut commit)?,
        };
        let deltas = commit.deltas();

        let receipt = self.commit(user, commit).await?;
        if receipt.replayed {
            return Ok(SaveOutcome::replayed(receipt.operation_id));
        }

        info!(
            user_id = %user,
            operation_id = %receipt.operation_id,
            transactions = ids.len(),
            edited = editing_id.is_some(),
            "Transaction saved"
        );

        Ok(SaveOutcome {
            operation_id: receipt.operation_id,
            transaction_ids: ids,
            deltas,
            replayed: false,
        })
    }

    fn plan_create(
        &self,
        snapshot: &LedgerSnapshot,
        input: &TransactionInput,
        commit: &mut LedgerCommit,
    ) -> Result<Vec<TransactionId>, LedgerError> {
        validate_input(input, snapshot, self.settings.max_installments, true)?;
        let roots = recurrence::expand(input, self.settings.recurrence(), Utc::now())?;

        let deltas = BalanceService::net(roots.iter().flat_map(BalanceService::apply));
        let ids = roots.iter().map(|t| t.id).collect();
        for tx in roots {
            commit.push(LedgerOp::InsertTransaction(tx));
        }
        commit.adjust(deltas);
        Ok(ids)
    }

    fn plan_edit(
        &self,
        snapshot: &LedgerSnapshot,
        input: &TransactionInput,
        id: TransactionId,
        commit: &mut LedgerCommit,
    ) -> Result<Vec<TransactionId>, LedgerError> {
        let index = snapshot.index();
        let existing = index.get(id).ok_or(LedgerError::TransactionNotFound(id))?;
        if existing.is_child() {
            return Err(LedgerError::ChildImmutable(id));
        }
        validate_input(input, snapshot, self.settings.max_installments, false)?;

        let account_id = input.account_id.ok_or(LedgerError::MissingAccount)?;
        let mut updated = Transaction {
            description: input.description.trim().to_string(),
            amount: input.amount,
            date: input.date,
            kind: input.kind,
            account_id,
            to_account_id: input.effective_destination(),
            category_id: input.effective_category(),
            payment_method: input.payment_method.clone(),
            tags: input.tags.clone(),
            observation: input.observation.clone(),
            updated_at: Utc::now(),
            ..existing.clone()
        };

        commit.guard(CommitGuard::Version {
            transaction_id: id,
            updated_at: existing.updated_at,
        });

        let children = index.children_of(id).len();
        if children > 0 {
            if updated.kind != existing.kind
                || updated.account_id != existing.account_id
                || updated.to_account_id != existing.to_account_id
            {
                return Err(LedgerError::SettledRootLocked(id));
            }
            let derived = status_for(
                updated.amount,
                index.paid_total(id),
                self.settings.settlement_epsilon,
            );
            if input.status == TransactionStatus::Paid && derived != TransactionStatus::Paid {
                return Err(LedgerError::SettleRemainingInstead(id));
            }
            updated.status = derived;
            updated.payment_date = None;
            commit.guard(CommitGuard::ChildCount {
                root_id: id,
                expected: children,
            });
            commit.push(LedgerOp::UpdateTransaction(updated));
        } else {
            updated.status = input.status;
            updated.payment_date = input.effective_payment_date();
            let deltas = BalanceService::transition(
                AppliedState::of(existing, false).as_ref(),
                AppliedState::of(&updated, false).as_ref(),
            );
            commit.push(LedgerOp::UpdateTransaction(updated));
            commit.adjust(deltas);
        }

        Ok(vec![id])
    }

    /// Records a payment against a pending root.
    pub async fn settle(
        &self,
        user: UserId,
        input: SettlementInput,
        operation_id: Option<OperationId>,
    ) -> Result<SettlementOutcome, LedgerError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        if self.already_applied(user, operation_id).await?.is_some() {
            return self.replayed_settlement(user, input.root_id).await;
        }

        let snapshot = self.snapshot(user).await?;
        let plan = settlement::plan(&snapshot, &input, self.settings.settlement_epsilon, Utc::now())?;

        let mut commit = LedgerCommit::new(operation_id.unwrap_or_default());
        commit.guard(CommitGuard::ChildCount {
            root_id: input.root_id,
            expected: plan.expected_children,
        });
        commit.push(LedgerOp::InsertTransaction(plan.child));
        commit.adjust(plan.deltas);
        if let Some(root) = plan.root_update {
            commit.push(LedgerOp::UpdateTransaction(root));
        }

        let receipt = self.commit(user, commit).await?;
        if receipt.replayed {
            return self.replayed_settlement(user, input.root_id).await;
        }

        info!(
            user_id = %user,
            root_id = %input.root_id,
            amount = %input.actual_amount,
            state = ?plan.outcome.state,
            "Settlement recorded"
        );
        Ok(plan.outcome)
    }

    /// Reports the current state of `root_id` for a settlement that already ran.
    async fn replayed_settlement(
        &self,
        user: UserId,
        root_id: TransactionId,
    ) -> Result<SettlementOutcome, LedgerError> {
        let current = self.snapshot(user).await?;
        let index = current.index();
        let root = index
            .get(root_id)
            .ok_or(LedgerError::TransactionNotFound(root_id))?;
        Ok(SettlementOutcome {
            root_id: root.id,
            child_id: None,
            state: settlement::settlement_state(root, &index),
            paid_total: index.paid_total(root.id),
            remaining: settlement::remaining(root, &index),
            replayed: true,
        })
    }

    /// Deletes a transaction.
    ///
    /// A root with settlements is refused with [`DeleteOutcome::Blocked`]
    /// unless `force` is set, in which case the settlements go too. Deleting a
    /// settlement reverses its effect and re-derives its root's status.
    /// Repeating a delete under the same `operation_id` changes nothing and
    /// answers [`DeleteOutcome::AlreadyApplied`].
    pub async fn delete_transaction(
        &self,
        user: UserId,
        id: TransactionId,
        force: bool,
        operation_id: Option<OperationId>,
    ) -> Result<DeleteOutcome, LedgerError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        if let Some(applied) = self.already_applied(user, operation_id).await? {
            return Ok(DeleteOutcome::AlreadyApplied {
                operation_id: applied,
            });
        }

        let snapshot = self.snapshot(user).await?;
        let index = snapshot.index();
        let tx = index.get(id).ok_or(LedgerError::TransactionNotFound(id))?;
        let children = index.children_of(id);

        let mut commit = LedgerCommit::new(operation_id.unwrap_or_default());
        let mut removed = Vec::new();

        if let Some(parent_id) = tx.parent_id {
            commit.push(LedgerOp::DeleteTransaction(id));
            commit.adjust(BalanceService::reverse(tx, false));
            removed.push(id);

            if let Some(parent) = index.get(parent_id) {
                let siblings = index.children_of(parent_id);
                commit.guard(CommitGuard::ChildCount {
                    root_id: parent_id,
                    expected: siblings.len(),
                });
                let status = if siblings.len() > 1 {
                    status_for(
                        parent.amount,
                        index.paid_total(parent_id) - tx.amount,
                        self.settings.settlement_epsilon,
                    )
                } else {
                    TransactionStatus::Pending
                };
                if status != parent.status {
                    commit.push(LedgerOp::UpdateTransaction(Transaction {
                        status,
                        payment_date: None,
                        updated_at: Utc::now(),
                        ..parent.clone()
                    }));
                }
            }
        } else if !children.is_empty() {
            if !force {
                info!(user_id = %user, transaction_id = %id, children = children.len(), "Delete blocked by settlements");
                return Ok(DeleteOutcome::Blocked {
                    children: children.len(),
                });
            }
            commit.guard(CommitGuard::ChildCount {
                root_id: id,
                expected: children.len(),
            });
            let mut deltas = Vec::new();
            for child in children {
                commit.push(LedgerOp::DeleteTransaction(child.id));
                deltas.extend(BalanceService::reverse(child, false));
                removed.push(child.id);
            }
            commit.push(LedgerOp::DeleteTransaction(id));
            commit.adjust(BalanceService::net(deltas));
            removed.push(id);
        } else {
            commit.guard(CommitGuard::Version {
                transaction_id: id,
                updated_at: tx.updated_at,
            });
            commit.push(LedgerOp::DeleteTransaction(id));
            commit.adjust(BalanceService::reverse(tx, false));
            removed.push(id);
        }

        let receipt = self.commit(user, commit).await?;
        if receipt.replayed {
            return Ok(DeleteOutcome::AlreadyApplied {
                operation_id: receipt.operation_id,
            });
        }
        info!(user_id = %user, transaction_id = %id, removed = removed.len(), force, "Transaction deleted");
        Ok(DeleteOutcome::Deleted { removed })
    }

    /// Realized, pending and projected totals.
    pub async fn summarize(
        &self,
        user: UserId,
        range: Option<DateRange>,
        basis: Regime,
    ) -> Result<FinancialSummary, LedgerError> {
        let snapshot = self.snapshot(user).await?;
        Ok(ReportService::summarize(
            &snapshot.accounts,
            &snapshot.transactions,
            range.as_ref(),
            basis,
        ))
    }

    /// Income statement for one month.
    pub async fn dre(
        &self,
        user: UserId,
        month: DateRange,
        regime: Regime,
    ) -> Result<DreReport, LedgerError> {
        let snapshot = self.snapshot(user).await?;
        Ok(ReportService::dre(
            &snapshot.categories,
            &snapshot.transactions,
            &month,
            regime,
        ))
    }

    /// Compares stored balances with balances derived from the log.
    pub async fn verify_balances(&self, user: UserId) -> Result<IntegrityReport, LedgerError> {
        let snapshot = self.snapshot(user).await?;
        let report = BalanceService::verify(&snapshot.accounts, &snapshot.transactions);
        for divergence in &report.divergences {
            error!(
                user_id = %user,
                account_id = %divergence.account_id,
                stored = %divergence.stored,
                derived = %divergence.derived,
                "Account balance diverges from transaction log"
            );
        }
        Ok(report)
    }

    /// Roots with their derived state, most recent first.
    pub async fn list_ledger(&self, user: UserId) -> Result<Vec<LedgerLine>, LedgerError> {
        let snapshot = self.snapshot(user).await?;
        let index = snapshot.index();

        let mut lines: Vec<LedgerLine> = snapshot
            .transactions
            .iter()
            .filter(|t| t.is_root())
            .map(|root| LedgerLine {
                transaction: root.clone(),
                state: settlement::settlement_state(root, &index),
                paid_total: index.paid_total(root.id),
                remaining: settlement::remaining(root, &index),
                children: index
                    .children_of(root.id)
                    .iter()
                    .map(|c| (*c).clone())
                    .collect(),
            })
            .collect();
        lines.sort_by(|a, b| {
            b.transaction
                .date
                .cmp(&a.transaction.date)
                .then_with(|| b.transaction.id.cmp(&a.transaction.id))
        });
        Ok(lines)
    }

    /// Opens an account.
    pub async fn create_account(&self, user: UserId, input: NewAccount) -> Result<Account, LedgerError> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::MissingName);
        }
        let account = input.into_account();
        self.store.create_account(user, &account).await?;
        info!(user_id = %user, account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Lists accounts.
    pub async fn list_accounts(&self, user: UserId) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(user).await?)
    }

    /// Creates a category.
    pub async fn create_category(&self, user: UserId, input: NewCategory) -> Result<Category, LedgerError> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::MissingName);
        }
        let category = input.into_category();
        self.store.create_category(user, &category).await?;
        info!(user_id = %user, category_id = %category.id, "Category created");
        Ok(category)
    }

    /// Lists categories.
    pub async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, LedgerError> {
        Ok(self.store.list_categories(user).await?)
    }
}
