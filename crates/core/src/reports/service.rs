//! Report generation service.
//!
//! Both reports are pure functions of a transaction snapshot: nothing is cached
//! and running them twice over the same data, in any order, gives the same result.

use std::collections::HashMap;

use rust_decimal::Decimal;
use saldo_shared::types::CategoryId;
use saldo_shared::types::money::{non_negative, percent_of};

use super::period::{DateRange, in_range};
use super::regime::Regime;
use super::types::{DreLine, DreReport, FinancialSummary};
use crate::ledger::{
    Account, Category, DreCategory, SettlementIndex, Transaction, TransactionKind,
};

/// Service for generating financial reports.
pub struct ReportService;

impl ReportService {
    /// Computes realized, pending and projected totals.
    ///
    /// Realized totals use the regime filter plus a paid status. Pending totals
    /// cover the open part of pending roots, filtered by due date.
    #[must_use]
    pub fn summarize(
        accounts: &[Account],
        transactions: &[Transaction],
        range: Option<&DateRange>,
        basis: Regime,
    ) -> FinancialSummary {
        let index = SettlementIndex::build(transactions);
        let recognised = basis.filter();

        let total_balance: Decimal = accounts.iter().map(|a| a.balance).sum();
        let mut total_income = Decimal::ZERO;
        let mut total_expense = Decimal::ZERO;
        let mut pending_income = Decimal::ZERO;
        let mut pending_expense = Decimal::ZERO;

        for tx in transactions {
            if tx.is_paid() && recognised(tx, &index, range) {
                match tx.kind {
                    TransactionKind::Income => total_income += tx.amount,
                    TransactionKind::Expense => total_expense += tx.amount,
                    TransactionKind::Transfer => {}
                }
            }

            if tx.is_root() && tx.is_pending() && in_range(range, tx.date) {
                let open = non_negative(tx.amount - index.paid_total(tx.id));
                match tx.kind {
                    TransactionKind::Income => pending_income += open,
                    TransactionKind::Expense => pending_expense += open,
                    TransactionKind::Transfer => {}
                }
            }
        }

        FinancialSummary {
            total_balance,
            total_income,
            total_expense,
            pending_income,
            pending_expense,
            projected_balance: total_balance + pending_income - pending_expense,
            net_result: total_income - total_expense,
        }
    }

    /// Builds the income statement for `period`.
    ///
    /// Recognises the same realized set as [`Self::summarize`]: the regime
    /// filter plus a paid status, so net profit always equals realized income
    /// minus realized expense for the month.
    #[must_use]
    pub fn dre(
        categories: &[Category],
        transactions: &[Transaction],
        period: &DateRange,
        regime: Regime,
    ) -> DreReport {
        let index = SettlementIndex::build(transactions);
        let recognised = regime.filter();
        let tags: HashMap<CategoryId, Option<DreCategory>> =
            categories.iter().map(|c| (c.id, c.dre_category)).collect();

        let mut buckets: HashMap<DreCategory, Decimal> = HashMap::new();
        let mut unclassified_count = 0;

        for tx in transactions
            .iter()
            .filter(|tx| tx.is_paid() && recognised(tx, &index, Some(period)))
        {
            let tag = tx.category_id.and_then(|id| tags.get(&id).copied().flatten());
            let Some((bucket, classified)) = classify(tx.kind, tag) else {
                continue;
            };
            if !classified {
                unclassified_count += 1;
            }
            *buckets.entry(bucket).or_default() += tx.amount;
        }

        let value = |bucket: DreCategory| buckets.get(&bucket).copied().unwrap_or_default();
        let gross_revenue = value(DreCategory::GrossRevenue);
        let taxes = value(DreCategory::Taxes);
        let direct_costs = value(DreCategory::DirectCosts);
        let personnel = value(DreCategory::PersonnelExpense);
        let commercial = value(DreCategory::CommercialExpense);
        let administrative = value(DreCategory::AdministrativeExpense);
        let financial_income = value(DreCategory::FinancialIncome);
        let financial_expense = value(DreCategory::FinancialExpense);

        let net_revenue = gross_revenue - taxes;
        let contribution_margin = net_revenue - direct_costs;
        let total_operating_expense = personnel + commercial + administrative;
        let ebitda = contribution_margin - total_operating_expense;
        let financial_result = financial_income - financial_expense;
        let net_profit = ebitda + financial_result;

        let line = |v: Decimal| DreLine {
            value: v,
            vertical_analysis: percent_of(v, gross_revenue),
        };

        DreReport {
            period: *period,
            regime,
            gross_revenue: line(gross_revenue),
            taxes: line(taxes),
            net_revenue: line(net_revenue),
            direct_costs: line(direct_costs),
            contribution_margin: line(contribution_margin),
            personnel_expense: line(personnel),
            commercial_expense: line(commercial),
            administrative_expense: line(administrative),
            total_operating_expense: line(total_operating_expense),
            ebitda: line(ebitda),
            financial_income: line(financial_income),
            financial_expense: line(financial_expense),
            financial_result: line(financial_result),
            net_profit: line(net_profit),
            unclassified_count,
        }
    }
}

/// Picks the DRE bucket for a transaction.
///
/// Returns `None` for transfers. The flag is false when the tag was missing
/// or belonged to the other side and the default bucket was used instead.
fn classify(kind: TransactionKind, tag: Option<DreCategory>) -> Option<(DreCategory, bool)> {
    let (fallback, income_side) = match kind {
        TransactionKind::Income => (DreCategory::GrossRevenue, true),
        TransactionKind::Expense => (DreCategory::AdministrativeExpense, false),
        TransactionKind::Transfer => return None,
    };
    Some(match tag {
        Some(bucket) if bucket.is_income_side() == income_side => (bucket, true),
        _ => (fallback, false),
    })
}
