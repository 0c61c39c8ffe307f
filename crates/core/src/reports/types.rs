//! Report data types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::period::DateRange;
use super::regime::Regime;

/// Realized, pending and projected totals for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// Sum of every account balance, never period filtered.
    pub total_balance: Decimal,
    /// Realized income in the period.
    pub total_income: Decimal,
    /// Realized expense in the period.
    pub total_expense: Decimal,
    /// Open income on pending roots.
    pub pending_income: Decimal,
    /// Open expense on pending roots.
    pub pending_expense: Decimal,
    /// `total_balance + pending_income - pending_expense`.
    pub projected_balance: Decimal,
    /// `total_income - total_expense`.
    pub net_result: Decimal,
}

/// A value on the income statement with its share of gross revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreLine {
    /// Amount.
    pub value: Decimal,
    /// Vertical analysis: percent of gross revenue, 2 decimals.
    pub vertical_analysis: Decimal,
}

/// Income statement (DRE) for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreReport {
    /// Month covered.
    pub period: DateRange,
    /// Recognition regime.
    pub regime: Regime,
    /// Gross operating revenue.
    pub gross_revenue: DreLine,
    /// Taxes on revenue.
    pub taxes: DreLine,
    /// Gross revenue minus taxes.
    pub net_revenue: DreLine,
    /// Direct costs.
    pub direct_costs: DreLine,
    /// Net revenue minus direct costs.
    pub contribution_margin: DreLine,
    /// Personnel.
    pub personnel_expense: DreLine,
    /// Commercial.
    pub commercial_expense: DreLine,
    /// Administrative (and untagged expense).
    pub administrative_expense: DreLine,
    /// Personnel + commercial + administrative.
    pub total_operating_expense: DreLine,
    /// Contribution margin minus operating expense.
    pub ebitda: DreLine,
    /// Financial income.
    pub financial_income: DreLine,
    /// Financial expense.
    pub financial_expense: DreLine,
    /// Financial income minus financial expense.
    pub financial_result: DreLine,
    /// EBITDA plus financial result.
    pub net_profit: DreLine,
    /// Entries without a usable tag, booked to the default bucket of their side.
    pub unclassified_count: usize,
}
