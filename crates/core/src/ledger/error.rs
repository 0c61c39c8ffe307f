//! Ledger error types for validation, state and persistence errors.
//!
//! Errors fall into the families the HTTP layer and callers care about:
//! validation (rejected before any write), missing records, concurrency,
//! reconciliation failures (a partial write left balances and transactions
//! out of step), plain persistence failures, and integrity violations found
//! when stored balances are checked against the transaction log.

use rust_decimal::Decimal;
use saldo_shared::AppError;
use saldo_shared::types::{AccountId, CategoryId, OperationId, TransactionId};
use thiserror::Error;

use super::store::StoreError;

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before any write.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// Another writer got there first; retry.
    Conflict,
    /// A multi-step write stopped half way.
    Reconciliation,
    /// The store could not be reached.
    Persistence,
    /// Stored balances disagree with the transaction log.
    Integrity,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    /// Description is blank.
    #[error("Description is required")]
    MissingDescription,

    /// Account or category name is blank.
    #[error("Name is required")]
    MissingName,

    /// No account was given.
    #[error("Account is required")]
    MissingAccount,

    /// Income and expense transactions need a category.
    #[error("Category is required for income and expense transactions")]
    MissingCategory,

    /// Transfers need a destination account.
    #[error("Transfer requires a destination account")]
    MissingDestinationAccount,

    /// Transfers must move money between two different accounts.
    #[error("Transfer source and destination must differ")]
    SameAccountTransfer,

    /// Recurring entries need a recurrence type.
    #[error("Recurring transaction requires a recurrence type")]
    MissingRecurringType,

    /// Installment / occurrence count out of range.
    #[error("Recurrence count must be between 1 and {max}, got {count}")]
    InvalidRecurrenceCount {
        /// Requested count.
        count: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Settlement children can only be deleted.
    #[error("Settlement {0} cannot be edited, only deleted")]
    ChildImmutable(TransactionId),

    /// Settlement children cannot be settled themselves.
    #[error("Transaction {0} is a settlement and cannot be settled")]
    NotSettleable(TransactionId),

    /// The root is already paid.
    #[error("Transaction {0} is already paid")]
    AlreadyPaid(TransactionId),

    /// A partially settled root cannot be marked paid by editing.
    #[error("Transaction {0} has settlements; settle the remaining balance instead")]
    SettleRemainingInstead(TransactionId),

    /// A root with settlements keeps its type and accounts.
    #[error("Transaction {0} has settlements; its type and accounts cannot change")]
    SettledRootLocked(TransactionId),

    // ========== Lookup Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Category not found.
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    // ========== Concurrency Errors ==========
    /// A guard checked at commit time no longer holds.
    #[error("Concurrent modification detected, please retry: {0}")]
    ConcurrentModification(String),

    // ========== Consistency Errors ==========
    /// Some, but not all, writes of one logical operation were applied.
    #[error(
        "Reconciliation failure in operation {operation_id}: {applied} of {total} writes applied: {reason}"
    )]
    ReconciliationFailure {
        /// The logical operation that broke.
        operation_id: OperationId,
        /// Writes that made it to the store.
        applied: usize,
        /// Writes in the operation.
        total: usize,
        /// Underlying store failure.
        reason: String,
    },

    /// Stored balances diverge from the transaction log.
    #[error("Data integrity violation: {count} account(s) diverge from the transaction log")]
    IntegrityViolation {
        /// Number of divergent accounts.
        count: usize,
    },

    // ========== Persistence Errors ==========
    /// The store failed before anything was written.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Returns the coarse error family.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveAmount(_)
            | Self::MissingDescription
            | Self::MissingName
            | Self::MissingAccount
            | Self::MissingCategory
            | Self::MissingDestinationAccount
            | Self::SameAccountTransfer
            | Self::MissingRecurringType
            | Self::InvalidRecurrenceCount { .. }
            | Self::ChildImmutable(_)
            | Self::NotSettleable(_)
            | Self::AlreadyPaid(_)
            | Self::SettleRemainingInstead(_)
            | Self::SettledRootLocked(_) => ErrorKind::Validation,
            Self::AccountNotFound(_) | Self::CategoryNotFound(_) | Self::TransactionNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::ConcurrentModification(_) => ErrorKind::Conflict,
            Self::ReconciliationFailure { .. } => ErrorKind::Reconciliation,
            Self::IntegrityViolation { .. } => ErrorKind::Integrity,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::MissingDescription => "MISSING_DESCRIPTION",
            Self::MissingName => "MISSING_NAME",
            Self::MissingAccount => "MISSING_ACCOUNT",
            Self::MissingCategory => "MISSING_CATEGORY",
            Self::MissingDestinationAccount => "MISSING_DESTINATION_ACCOUNT",
            Self::SameAccountTransfer => "SAME_ACCOUNT_TRANSFER",
            Self::MissingRecurringType => "MISSING_RECURRING_TYPE",
            Self::InvalidRecurrenceCount { .. } => "INVALID_RECURRENCE_COUNT",
            Self::ChildImmutable(_) => "SETTLEMENT_IMMUTABLE",
            Self::NotSettleable(_) => "NOT_SETTLEABLE",
            Self::AlreadyPaid(_) => "ALREADY_PAID",
            Self::SettleRemainingInstead(_) => "SETTLE_REMAINING_INSTEAD",
            Self::SettledRootLocked(_) => "SETTLED_ROOT_LOCKED",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::ReconciliationFailure { .. } => "RECONCILIATION_FAILURE",
            Self::IntegrityViolation { .. } => "INTEGRITY_VIOLATION",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Persistence => 503,
            ErrorKind::Reconciliation | ErrorKind::Integrity => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GuardFailed(reason) => Self::ConcurrentModification(reason),
            StoreError::PartialCommit {
                operation_id,
                applied,
                total,
                reason,
            } => Self::ReconciliationFailure {
                operation_id,
                applied,
                total,
                reason,
            },
            StoreError::NotFound(what) | StoreError::Unavailable(what) => Self::Persistence(what),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Persistence => Self::Database(message),
            ErrorKind::Reconciliation | ErrorKind::Integrity => Self::Integrity(message),
        }
    }
}
