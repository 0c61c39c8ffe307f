//! Caller identity as provided by the external authentication service.
//!
//! The ledger engine trusts whoever calls it; these types let the HTTP layer
//! carry the authenticated user and gate operations on permission flags.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Permission flags granted by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create, edit, settle and delete transactions; manage accounts and categories.
    ManageTransactions,
    /// Read summaries, income statements and integrity reports.
    ViewReports,
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manage_transactions" | "managetransactions" => Ok(Self::ManageTransactions),
            "view_reports" | "viewreports" => Ok(Self::ViewReports),
            other => Err(format!("Unknown permission: {other}")),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// The user whose ledger is being operated on.
    pub user_id: UserId,
    /// Flags granted to this caller.
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Creates a principal with the given permissions.
    #[must_use]
    pub fn new(user_id: UserId, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            permissions,
        }
    }

    /// Returns true if the caller holds `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Parses a comma separated permission list, ignoring unknown entries.
    #[must_use]
    pub fn parse_permissions(raw: &str) -> Vec<Permission> {
        raw.split(',')
            .filter(|p| !p.trim().is_empty())
            .filter_map(|p| p.parse().ok())
            .collect()
    }
}
