//! Transaction ledger and settlement engine.
//!
//! This module implements the core ledger functionality:
//! - Domain types for accounts, categories and transactions
//! - Balance reconciliation (signed deltas, derived balances, integrity checks)
//! - Settlement ("baixa") of pending roots
//! - Recurrence expansion into monthly roots
//! - Input validation
//! - The store seam and an in-memory store
//! - The engine orchestrating all of the above

pub mod balance;
pub mod engine;
pub mod error;
pub mod index;
pub mod memory;
pub mod recurrence;
pub mod settlement;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod balance_props;
#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod settlement_props;

pub use balance::{AppliedState, BalanceDelta, BalanceDivergence, BalanceService, IntegrityReport};
pub use engine::{DeleteOutcome, LedgerEngine, LedgerLine, LedgerSettings, SaveOutcome};
pub use error::{ErrorKind, LedgerError};
pub use index::{LedgerSnapshot, SettlementIndex};
pub use memory::InMemoryLedgerStore;
pub use settlement::SettlementOutcome;
pub use store::{CommitGuard, CommitReceipt, LedgerCommit, LedgerOp, LedgerStore, StoreError};
pub use types::{
    Account, AccountType, Category, CategoryKind, DreCategory, NewAccount, NewCategory,
    RecurringType, SettlementInput, SettlementState, Transaction, TransactionInput,
    TransactionKind, TransactionStatus,
};
