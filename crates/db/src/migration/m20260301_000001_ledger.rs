//! Ledger schema: accounts, categories, transactions and the applied
//! operations log used to recognise replays.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS applied_operations, transactions, categories, accounts CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const LEDGER_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    account_type VARCHAR(20) NOT NULL
        CHECK (account_type IN ('checking', 'investment', 'cash')),
    color VARCHAR(20),
    initial_balance NUMERIC(19, 2) NOT NULL DEFAULT 0,
    balance NUMERIC(19, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_accounts_user ON accounts(user_id);

CREATE TABLE categories (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    kind VARCHAR(20) NOT NULL CHECK (kind IN ('income', 'expense')),
    dre_category VARCHAR(40),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_categories_user ON categories(user_id);

CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    description TEXT NOT NULL,
    amount NUMERIC(19, 2) NOT NULL CHECK (amount > 0),
    date DATE NOT NULL,
    payment_date DATE,
    kind VARCHAR(20) NOT NULL CHECK (kind IN ('INCOME', 'EXPENSE', 'TRANSFER')),
    status VARCHAR(20) NOT NULL CHECK (status IN ('PENDING', 'PAID')),
    account_id UUID NOT NULL REFERENCES accounts(id),
    to_account_id UUID REFERENCES accounts(id),
    category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
    -- Children are removed by the engine, never by cascade
    parent_id UUID REFERENCES transactions(id),
    is_recurring BOOLEAN NOT NULL DEFAULT false,
    recurring_type VARCHAR(20) CHECK (recurring_type IN ('FIXED', 'INSTALLMENT')),
    installment_current INTEGER,
    installment_total INTEGER,
    payment_method VARCHAR(50),
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    observation TEXT,
    receipt_ref TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_transfer_destination CHECK (
        kind <> 'TRANSFER' OR (to_account_id IS NOT NULL AND to_account_id <> account_id)
    )
);

CREATE INDEX idx_transactions_user_date ON transactions(user_id, date DESC);
CREATE INDEX idx_transactions_parent ON transactions(parent_id) WHERE parent_id IS NOT NULL;

CREATE TABLE applied_operations (
    operation_id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_applied_operations_user ON applied_operations(user_id, applied_at DESC);
";
