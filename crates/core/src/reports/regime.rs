//! Accounting regimes.
//!
//! The regime is resolved once per report call into a plain filter function;
//! aggregation loops never branch on it again.

use serde::{Deserialize, Serialize};

use super::error::ReportError;
use super::period::{DateRange, in_range};
use crate::ledger::{SettlementIndex, Transaction};

/// Signature shared by the per-regime filters.
pub type RegimeFilter = fn(&Transaction, &SettlementIndex<'_>, Option<&DateRange>) -> bool;

/// When a transaction is recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Accrual: recognised on its due date. Only roots count; reports add a
    /// paid status on top, so open roots are never realized.
    #[default]
    Competence,
    /// Cash: recognised on its payment date. Children count; their roots do not.
    Cash,
}

impl Regime {
    /// The filter deciding which transactions this regime recognises.
    #[must_use]
    pub fn filter(self) -> RegimeFilter {
        match self {
            Self::Competence => competence,
            Self::Cash => cash,
        }
    }
}

impl std::str::FromStr for Regime {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "competence" | "accrual" => Ok(Self::Competence),
            "cash" => Ok(Self::Cash),
            other => Err(ReportError::InvalidRegime(other.to_string())),
        }
    }
}

fn competence(tx: &Transaction, _index: &SettlementIndex<'_>, range: Option<&DateRange>) -> bool {
    tx.is_root() && in_range(range, tx.date)
}

fn cash(tx: &Transaction, index: &SettlementIndex<'_>, range: Option<&DateRange>) -> bool {
    if !tx.is_paid() || (tx.is_root() && index.has_children(tx.id)) {
        return false;
    }
    tx.payment_date.is_some_and(|paid_on| in_range(range, paid_on))
}
