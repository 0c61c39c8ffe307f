//! Ledger domain types.
//!
//! Accounts, categories and transactions as the engine sees them, plus the
//! inputs callers hand to the engine when creating, editing or settling.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use saldo_shared::types::{AccountId, CategoryId, TransactionId};

/// Kind of money movement.
///
/// Amounts are always stored as positive magnitudes; the kind decides the sign
/// when the transaction touches an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
    /// Money moving between two of the user's accounts.
    Transfer,
}

/// Stored status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Not yet realized (or only partially, see [`SettlementState`]).
    Pending,
    /// Realized; affects balances.
    Paid,
}

/// Derived settlement state of a root transaction.
///
/// `Partial` is never stored: it is a `Pending` root whose paid children cover
/// some, but not all, of its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementState {
    /// Nothing settled yet.
    Pending,
    /// Some settlements recorded, a remainder is still open.
    Partial,
    /// Settled in full.
    Paid,
}

/// How a recurring entry repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringType {
    /// Same amount every month.
    Fixed,
    /// A total split into N monthly parts.
    Installment,
}

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Checking / current account.
    Checking,
    /// Investment account.
    Investment,
    /// Physical cash.
    Cash,
}

/// Which side of the income statement a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Income category.
    Income,
    /// Expense category.
    Expense,
}

/// Income-statement bucket a category can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DreCategory {
    /// Gross operating revenue.
    GrossRevenue,
    /// Taxes levied on revenue.
    Taxes,
    /// Direct costs (goods, services sold).
    DirectCosts,
    /// Payroll and related charges.
    PersonnelExpense,
    /// Sales and marketing.
    CommercialExpense,
    /// General and administrative.
    AdministrativeExpense,
    /// Interest and other financial income.
    FinancialIncome,
    /// Interest, fees and other financial expense.
    FinancialExpense,
}

impl DreCategory {
    /// All buckets, in statement order.
    pub const ALL: [Self; 8] = [
        Self::GrossRevenue,
        Self::Taxes,
        Self::DirectCosts,
        Self::PersonnelExpense,
        Self::CommercialExpense,
        Self::AdministrativeExpense,
        Self::FinancialIncome,
        Self::FinancialExpense,
    ];

    /// Returns true for buckets fed by income transactions.
    #[must_use]
    pub fn is_income_side(self) -> bool {
        matches!(self, Self::GrossRevenue | Self::FinancialIncome)
    }
}

/// A money account owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Display color (hex).
    pub color: Option<String>,
    /// Opening balance; never changes after creation.
    pub initial_balance: Decimal,
    /// Running balance, mutated only by the ledger engine.
    pub balance: Decimal,
}

/// Input for opening a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Display color (hex).
    #[serde(default)]
    pub color: Option<String>,
    /// Opening balance.
    #[serde(default)]
    pub initial_balance: Decimal,
}

impl NewAccount {
    /// Builds the account record with a fresh ID and `balance = initial_balance`.
    #[must_use]
    pub fn into_account(self) -> Account {
        Account {
            id: AccountId::new(),
            name: self.name,
            account_type: self.account_type,
            color: self.color,
            initial_balance: self.initial_balance,
            balance: self.initial_balance,
        }
    }
}

/// A transaction category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Income or expense side.
    pub kind: CategoryKind,
    /// Optional income-statement bucket.
    pub dre_category: Option<DreCategory>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Income or expense side.
    pub kind: CategoryKind,
    /// Optional income-statement bucket.
    #[serde(default)]
    pub dre_category: Option<DreCategory>,
}

impl NewCategory {
    /// Builds the category record with a fresh ID.
    #[must_use]
    pub fn into_category(self) -> Category {
        Category {
            id: CategoryId::new(),
            name: self.name,
            kind: self.kind,
            dre_category: self.dre_category,
        }
    }
}

/// A ledger transaction: either a root or a settlement child of a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Free-text description.
    pub description: String,
    /// Positive magnitude.
    pub amount: Decimal,
    /// Due / competence date.
    pub date: NaiveDate,
    /// Actual payment date, set only when paid.
    pub payment_date: Option<NaiveDate>,
    /// Income, expense or transfer.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Stored status.
    pub status: TransactionStatus,
    /// Account the money leaves (expense, transfer) or enters (income).
    pub account_id: AccountId,
    /// Receiving account of a transfer.
    pub to_account_id: Option<AccountId>,
    /// Category; never set on transfers.
    pub category_id: Option<CategoryId>,
    /// Root this transaction settles, if it is a settlement child.
    pub parent_id: Option<TransactionId>,
    /// Whether this transaction came from a recurring entry.
    pub is_recurring: bool,
    /// Recurrence flavour of the originating entry.
    pub recurring_type: Option<RecurringType>,
    /// 1-based position within the recurring series.
    pub installment_current: Option<u32>,
    /// Size of an installment series.
    pub installment_total: Option<u32>,
    /// Payment method recorded at settlement.
    pub payment_method: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text observation.
    pub observation: Option<String>,
    /// Reference to an uploaded receipt.
    pub receipt_ref: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written; doubles as an optimistic version.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns true for a transaction with no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns true for a settlement child.
    #[must_use]
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Returns true if the stored status is paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }

    /// Returns true if the stored status is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Returns true for transfers.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.kind == TransactionKind::Transfer
    }
}

/// User-entered data for creating or editing a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    /// Free-text description.
    pub description: String,
    /// Amount; for installments, the total to split.
    pub amount: Decimal,
    /// Due / competence date (first occurrence for recurring entries).
    pub date: NaiveDate,
    /// Payment date when created or edited as paid; defaults to `date`.
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Income, expense or transfer.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Requested status.
    pub status: TransactionStatus,
    /// Source account.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Destination account (transfers only).
    #[serde(default)]
    pub to_account_id: Option<AccountId>,
    /// Category (income and expense only).
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Whether to expand into a recurring series.
    #[serde(default)]
    pub is_recurring: bool,
    /// Recurrence flavour when `is_recurring`.
    #[serde(default)]
    pub recurring_type: Option<RecurringType>,
    /// Number of installments / occurrences.
    #[serde(default)]
    pub recurrence_count: Option<u32>,
    /// Payment method.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text observation.
    #[serde(default)]
    pub observation: Option<String>,
}

impl TransactionInput {
    /// Payment date to record when the input is paid.
    #[must_use]
    pub fn effective_payment_date(&self) -> Option<NaiveDate> {
        match self.status {
            TransactionStatus::Paid => Some(self.payment_date.unwrap_or(self.date)),
            TransactionStatus::Pending => None,
        }
    }

    /// Category to store: transfers never carry one.
    #[must_use]
    pub fn effective_category(&self) -> Option<CategoryId> {
        match self.kind {
            TransactionKind::Transfer => None,
            TransactionKind::Income | TransactionKind::Expense => self.category_id,
        }
    }

    /// Destination account to store: only transfers carry one.
    #[must_use]
    pub fn effective_destination(&self) -> Option<AccountId> {
        match self.kind {
            TransactionKind::Transfer => self.to_account_id,
            TransactionKind::Income | TransactionKind::Expense => None,
        }
    }
}

/// Input for settling ("baixa") a pending root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementInput {
    /// Root being settled.
    pub root_id: TransactionId,
    /// Amount actually paid; may differ from the open balance.
    pub actual_amount: Decimal,
    /// Date the money moved.
    pub payment_date: NaiveDate,
    /// Account the money moved through.
    pub account_id: AccountId,
    /// Payment method.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text observation.
    #[serde(default)]
    pub observation: Option<String>,
    /// Reference to an uploaded receipt.
    #[serde(default)]
    pub receipt_ref: Option<String>,
}
