//! Projection store database schema.

/// SQL to create the accounts table and its unique indexes.
///
/// Kept in sync with `migrations/20260115100000_create_accounts.sql`.
pub const CREATE_ACCOUNTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS accounts (
    user_id     UUID PRIMARY KEY,
    email       TEXT NOT NULL DEFAULT '',
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    user_name   TEXT NOT NULL,
    password    TEXT NOT NULL DEFAULT '',
    role        TEXT NOT NULL DEFAULT '',
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_user_name
    ON accounts (user_name);
";
