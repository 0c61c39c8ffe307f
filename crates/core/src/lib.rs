//! Core business logic for Saldo.
//!
//! This crate contains pure business logic with NO web or database dependencies.
//! All financial calculations use `rust_decimal::Decimal` - NEVER floating point.
//!
//! Persistence is reached only through the [`ledger::LedgerStore`] trait.

pub mod ledger;
pub mod reports;
