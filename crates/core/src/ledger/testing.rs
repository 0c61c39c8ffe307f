//! Builders shared by the ledger unit tests.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{AccountId, CategoryId, TransactionId};

use super::types::{
    Account, AccountType, Category, CategoryKind, DreCategory, Transaction, TransactionInput,
    TransactionKind, TransactionStatus,
};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn account(id: AccountId, balance: Decimal) -> Account {
    Account {
        id,
        name: "Checking".to_string(),
        account_type: AccountType::Checking,
        color: None,
        initial_balance: balance,
        balance,
    }
}

pub(crate) fn category(kind: CategoryKind, dre: Option<DreCategory>) -> Category {
    Category {
        id: CategoryId::new(),
        name: format!("{kind:?}"),
        kind,
        dre_category: dre,
    }
}

pub(crate) fn root(
    kind: TransactionKind,
    amount: Decimal,
    status: TransactionStatus,
    account_id: AccountId,
) -> Transaction {
    let day = date(2026, 3, 10);
    let now = Utc::now();
    Transaction {
        id: TransactionId::new(),
        description: "Entry".to_string(),
        amount,
        date: day,
        payment_date: (status == TransactionStatus::Paid).then_some(day),
        kind,
        status,
        account_id,
        to_account_id: None,
        category_id: None,
        parent_id: None,
        is_recurring: false,
        recurring_type: None,
        installment_current: None,
        installment_total: None,
        payment_method: None,
        tags: vec![],
        observation: None,
        receipt_ref: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn transfer(
    amount: Decimal,
    status: TransactionStatus,
    from: AccountId,
    to: AccountId,
) -> Transaction {
    let mut tx = root(TransactionKind::Transfer, amount, status, from);
    tx.to_account_id = Some(to);
    tx
}

pub(crate) fn child_of(parent: &Transaction, amount: Decimal, account_id: AccountId) -> Transaction {
    let mut tx = root(parent.kind, amount, TransactionStatus::Paid, account_id);
    tx.parent_id = Some(parent.id);
    tx.category_id = parent.category_id;
    tx.to_account_id = parent.to_account_id;
    tx
}

pub(crate) fn input(
    kind: TransactionKind,
    amount: Decimal,
    status: TransactionStatus,
    account_id: AccountId,
    category_id: Option<CategoryId>,
) -> TransactionInput {
    TransactionInput {
        description: "Groceries".to_string(),
        amount,
        date: date(2026, 1, 31),
        payment_date: None,
        kind,
        status,
        account_id: Some(account_id),
        to_account_id: None,
        category_id,
        is_recurring: false,
        recurring_type: None,
        recurrence_count: None,
        payment_method: None,
        tags: vec![],
        observation: None,
    }
}
