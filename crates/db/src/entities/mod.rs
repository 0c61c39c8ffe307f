//! `SeaORM` entities for the ledger schema.

pub mod accounts;
pub mod applied_operations;
pub mod categories;
pub mod transactions;
