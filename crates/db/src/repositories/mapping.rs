//! Row <-> domain conversions.
//!
//! Enums are stored as text so the schema stays readable from `psql`; the
//! spellings match the JSON the API emits.

use chrono::Utc;
use saldo_core::ledger::{
    Account, AccountType, Category, CategoryKind, DreCategory, RecurringType, Transaction,
    TransactionKind, TransactionStatus,
};
use saldo_shared::types::{AccountId, CategoryId, TransactionId, UserId};
use sea_orm::{ActiveValue::Set, prelude::Json};
use thiserror::Error;

use crate::entities::{accounts, categories, transactions};

/// A stored value the domain cannot represent.
#[derive(Debug, Error)]
#[error("unexpected {column} value in database: {value}")]
pub struct MappingError {
    column: &'static str,
    value: String,
}

impl MappingError {
    fn new(column: &'static str, value: impl ToString) -> Self {
        Self {
            column,
            value: value.to_string(),
        }
    }
}

fn kind_str(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Income => "INCOME",
        TransactionKind::Expense => "EXPENSE",
        TransactionKind::Transfer => "TRANSFER",
    }
}

fn parse_kind(value: &str) -> Result<TransactionKind, MappingError> {
    match value {
        "INCOME" => Ok(TransactionKind::Income),
        "EXPENSE" => Ok(TransactionKind::Expense),
        "TRANSFER" => Ok(TransactionKind::Transfer),
        other => Err(MappingError::new("kind", other)),
    }
}

fn status_str(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Pending => "PENDING",
        TransactionStatus::Paid => "PAID",
    }
}

fn parse_status(value: &str) -> Result<TransactionStatus, MappingError> {
    match value {
        "PENDING" => Ok(TransactionStatus::Pending),
        "PAID" => Ok(TransactionStatus::Paid),
        other => Err(MappingError::new("status", other)),
    }
}

fn recurring_str(recurring: RecurringType) -> &'static str {
    match recurring {
        RecurringType::Fixed => "FIXED",
        RecurringType::Installment => "INSTALLMENT",
    }
}

fn parse_recurring(value: &str) -> Result<RecurringType, MappingError> {
    match value {
        "FIXED" => Ok(RecurringType::Fixed),
        "INSTALLMENT" => Ok(RecurringType::Installment),
        other => Err(MappingError::new("recurring_type", other)),
    }
}

fn account_type_str(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Checking => "checking",
        AccountType::Investment => "investment",
        AccountType::Cash => "cash",
    }
}

fn parse_account_type(value: &str) -> Result<AccountType, MappingError> {
    match value {
        "checking" => Ok(AccountType::Checking),
        "investment" => Ok(AccountType::Investment),
        "cash" => Ok(AccountType::Cash),
        other => Err(MappingError::new("account_type", other)),
    }
}

fn category_kind_str(kind: CategoryKind) -> &'static str {
    match kind {
        CategoryKind::Income => "income",
        CategoryKind::Expense => "expense",
    }
}

fn parse_category_kind(value: &str) -> Result<CategoryKind, MappingError> {
    match value {
        "income" => Ok(CategoryKind::Income),
        "expense" => Ok(CategoryKind::Expense),
        other => Err(MappingError::new("category kind", other)),
    }
}

fn dre_str(dre: DreCategory) -> &'static str {
    match dre {
        DreCategory::GrossRevenue => "gross_revenue",
        DreCategory::Taxes => "taxes",
        DreCategory::DirectCosts => "direct_costs",
        DreCategory::PersonnelExpense => "personnel_expense",
        DreCategory::CommercialExpense => "commercial_expense",
        DreCategory::AdministrativeExpense => "administrative_expense",
        DreCategory::FinancialIncome => "financial_income",
        DreCategory::FinancialExpense => "financial_expense",
    }
}

fn parse_dre(value: &str) -> Result<DreCategory, MappingError> {
    DreCategory::ALL
        .into_iter()
        .find(|dre| dre_str(*dre) == value)
        .ok_or_else(|| MappingError::new("dre_category", value))
}

fn to_i32(column: &'static str, value: Option<u32>) -> Result<Option<i32>, MappingError> {
    value
        .map(|n| i32::try_from(n).map_err(|_| MappingError::new(column, n)))
        .transpose()
}

fn to_u32(column: &'static str, value: Option<i32>) -> Result<Option<u32>, MappingError> {
    value
        .map(|n| u32::try_from(n).map_err(|_| MappingError::new(column, n)))
        .transpose()
}

pub(crate) fn transaction_from_model(model: transactions::Model) -> Result<Transaction, MappingError> {
    let tags = model
        .tags
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Transaction {
        id: TransactionId::from_uuid(model.id),
        description: model.description,
        amount: model.amount,
        date: model.date,
        payment_date: model.payment_date,
        kind: parse_kind(&model.kind)?,
        status: parse_status(&model.status)?,
        account_id: AccountId::from_uuid(model.account_id),
        to_account_id: model.to_account_id.map(AccountId::from_uuid),
        category_id: model.category_id.map(CategoryId::from_uuid),
        parent_id: model.parent_id.map(TransactionId::from_uuid),
        is_recurring: model.is_recurring,
        recurring_type: model.recurring_type.as_deref().map(parse_recurring).transpose()?,
        installment_current: to_u32("installment_current", model.installment_current)?,
        installment_total: to_u32("installment_total", model.installment_total)?,
        payment_method: model.payment_method,
        tags,
        observation: model.observation,
        receipt_ref: model.receipt_ref,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn transaction_to_active(
    user: UserId,
    tx: &Transaction,
) -> Result<transactions::ActiveModel, MappingError> {
    Ok(transactions::ActiveModel {
        id: Set(tx.id.into_inner()),
        user_id: Set(user.into_inner()),
        description: Set(tx.description.clone()),
        amount: Set(tx.amount),
        date: Set(tx.date),
        payment_date: Set(tx.payment_date),
        kind: Set(kind_str(tx.kind).to_string()),
        status: Set(status_str(tx.status).to_string()),
        account_id: Set(tx.account_id.into_inner()),
        to_account_id: Set(tx.to_account_id.map(AccountId::into_inner)),
        category_id: Set(tx.category_id.map(CategoryId::into_inner)),
        parent_id: Set(tx.parent_id.map(TransactionId::into_inner)),
        is_recurring: Set(tx.is_recurring),
        recurring_type: Set(tx.recurring_type.map(|r| recurring_str(r).to_string())),
        installment_current: Set(to_i32("installment_current", tx.installment_current)?),
        installment_total: Set(to_i32("installment_total", tx.installment_total)?),
        payment_method: Set(tx.payment_method.clone()),
        tags: Set(Json::from(tx.tags.clone())),
        observation: Set(tx.observation.clone()),
        receipt_ref: Set(tx.receipt_ref.clone()),
        created_at: Set(tx.created_at.into()),
        updated_at: Set(tx.updated_at.into()),
    })
}

pub(crate) fn account_from_model(model: accounts::Model) -> Result<Account, MappingError> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        name: model.name,
        account_type: parse_account_type(&model.account_type)?,
        color: model.color,
        initial_balance: model.initial_balance,
        balance: model.balance,
    })
}

pub(crate) fn account_to_active(user: UserId, account: &Account) -> accounts::ActiveModel {
    let now = Utc::now().into();
    accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        user_id: Set(user.into_inner()),
        name: Set(account.name.clone()),
        account_type: Set(account_type_str(account.account_type).to_string()),
        color: Set(account.color.clone()),
        initial_balance: Set(account.initial_balance),
        balance: Set(account.balance),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

pub(crate) fn category_from_model(model: categories::Model) -> Result<Category, MappingError> {
    Ok(Category {
        id: CategoryId::from_uuid(model.id),
        name: model.name,
        kind: parse_category_kind(&model.kind)?,
        dre_category: model.dre_category.as_deref().map(parse_dre).transpose()?,
    })
}

pub(crate) fn category_to_active(user: UserId, category: &Category) -> categories::ActiveModel {
    categories::ActiveModel {
        id: Set(category.id.into_inner()),
        user_id: Set(user.into_inner()),
        name: Set(category.name.clone()),
        kind: Set(category_kind_str(category.kind).to_string()),
        dre_category: Set(category.dre_category.map(|d| dre_str(d).to_string())),
        created_at: Set(Utc::now().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use sea_orm::ActiveValue;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new(),
            description: "Rent (2/12)".to_string(),
            amount: dec!(1500.00),
            date: NaiveDate::from_ymd_opt(2026, 4, 5).unwrap(),
            payment_date: None,
            kind: TransactionKind::Expense,
            status: TransactionStatus::Pending,
            account_id: AccountId::new(),
            to_account_id: None,
            category_id: Some(CategoryId::new()),
            parent_id: None,
            is_recurring: true,
            recurring_type: Some(RecurringType::Installment),
            installment_current: Some(2),
            installment_total: Some(12),
            payment_method: None,
            tags: vec!["home".to_string(), "fixed".to_string()],
            observation: Some("landlord".to_string()),
            receipt_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn unwrap_set<T: Into<sea_orm::Value>>(value: ActiveValue<T>) -> T {
        match value {
            ActiveValue::Set(inner) | ActiveValue::Unchanged(inner) => inner,
            ActiveValue::NotSet => panic!("value not set"),
        }
    }

    fn as_model(user: UserId, tx: &Transaction) -> transactions::Model {
        let active = transaction_to_active(user, tx).unwrap();
        transactions::Model {
            id: unwrap_set(active.id),
            user_id: unwrap_set(active.user_id),
            description: unwrap_set(active.description),
            amount: unwrap_set(active.amount),
            date: unwrap_set(active.date),
            payment_date: unwrap_set(active.payment_date),
            kind: unwrap_set(active.kind),
            status: unwrap_set(active.status),
            account_id: unwrap_set(active.account_id),
            to_account_id: unwrap_set(active.to_account_id),
            category_id: unwrap_set(active.category_id),
            parent_id: unwrap_set(active.parent_id),
            is_recurring: unwrap_set(active.is_recurring),
            recurring_type: unwrap_set(active.recurring_type),
            installment_current: unwrap_set(active.installment_current),
            installment_total: unwrap_set(active.installment_total),
            payment_method: unwrap_set(active.payment_method),
            tags: unwrap_set(active.tags),
            observation: unwrap_set(active.observation),
            receipt_ref: unwrap_set(active.receipt_ref),
            created_at: unwrap_set(active.created_at),
            updated_at: unwrap_set(active.updated_at),
        }
    }

    #[test]
    fn test_transaction_row_keeps_every_field() {
        let tx = sample();
        let model = as_model(UserId::new(), &tx);
        assert_eq!(model.kind, "EXPENSE");
        assert_eq!(model.recurring_type.as_deref(), Some("INSTALLMENT"));
        assert_eq!(transaction_from_model(model).unwrap(), tx);
    }

    #[test]
    fn test_unknown_status_is_reported() {
        let mut model = as_model(UserId::new(), &sample());
        model.status = "VOID".to_string();
        let err = transaction_from_model(model).unwrap_err();
        assert_eq!(err.to_string(), "unexpected status value in database: VOID");
    }

    #[test]
    fn test_negative_installment_is_rejected() {
        let mut model = as_model(UserId::new(), &sample());
        model.installment_current = Some(-1);
        assert!(transaction_from_model(model).is_err());
    }

    #[rstest]
    #[case(DreCategory::GrossRevenue, "gross_revenue")]
    #[case(DreCategory::AdministrativeExpense, "administrative_expense")]
    #[case(DreCategory::FinancialExpense, "financial_expense")]
    fn test_dre_spelling(#[case] dre: DreCategory, #[case] text: &str) {
        assert_eq!(dre_str(dre), text);
        assert_eq!(parse_dre(text).unwrap(), dre);
        assert_eq!(
            serde_json::to_value(dre).unwrap(),
            serde_json::Value::String(text.to_string())
        );
    }

    #[test]
    fn test_unknown_dre_is_reported() {
        assert!(parse_dre("depreciation").is_err());
    }
}
