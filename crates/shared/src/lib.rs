//! Shared types, errors, and configuration for Saldo.
//!
//! This crate provides common types used across all other crates:
//! - Money helpers with decimal precision
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Caller identity and permission flags
//! - Application-wide error types
//! - Configuration management

pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{Permission, Principal};
pub use config::{AppConfig, LedgerConfig};
pub use error::{AppError, AppResult};
