//! `PostgreSQL` implementation of the `ProjectionStore` trait.

use accounts_core::account::{Account, PartialAccount};
use accounts_core::store::{AccountFilter, ProjectionStore, StoreError};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::schema::CREATE_ACCOUNTS_TABLE;

const SELECT_ACCOUNTS: &str =
    "SELECT user_id, email, first_name, last_name, user_name, password, role FROM accounts";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    user_name: String,
    password: String,
    role: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            account_id: row.user_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            user_name: row.user_name,
            password: row.password,
            role: row.role,
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(db_err.message().to_owned());
        }
    }
    StoreError::Backend(err.to_string())
}

/// Text columns a filter may constrain, paired with the partial's value.
fn text_columns(partial: &PartialAccount) -> [(&'static str, Option<&String>); 6] {
    [
        ("email", partial.email.as_ref()),
        ("first_name", partial.first_name.as_ref()),
        ("last_name", partial.last_name.as_ref()),
        ("user_name", partial.user_name.as_ref()),
        ("password", partial.password.as_ref()),
        ("role", partial.role.as_ref()),
    ]
}

fn push_partial(builder: &mut QueryBuilder<'_, Postgres>, partial: &PartialAccount) {
    let mut clauses = 0;
    builder.push("(");
    match partial.parsed_account_id() {
        None => {}
        Some(Ok(id)) => {
            builder.push("user_id = ").push_bind(id);
            clauses += 1;
        }
        // An unparseable ID cannot match any stored UUID.
        Some(Err(_)) => {
            builder.push("FALSE");
            clauses += 1;
        }
    }
    for (column, value) in text_columns(partial) {
        if let Some(value) = value {
            if clauses > 0 {
                builder.push(" AND ");
            }
            builder.push(column).push(" = ").push_bind(value.clone());
            clauses += 1;
        }
    }
    if clauses == 0 {
        builder.push("TRUE");
    }
    builder.push(")");
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, filter: &AccountFilter) {
    builder.push(" WHERE ");
    match filter {
        AccountFilter::Match(partial) => push_partial(builder, partial),
        AccountFilter::AnyOf(partials) if partials.is_empty() => {
            builder.push("FALSE");
        }
        AccountFilter::AnyOf(partials) => {
            for (i, partial) in partials.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_partial(builder, partial);
            }
        }
    }
}

/// PostgreSQL-backed account projection.
#[derive(Debug, Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl PgProjectionStore {
    /// Creates a new `PgProjectionStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the accounts table and indexes if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(CREATE_ACCOUNTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for PgProjectionStore {
    async fn find_one(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_ACCOUNTS);
        push_where(&mut builder, filter);
        builder.push(" ORDER BY inserted_at, user_id LIMIT 1");

        let row = builder
            .build_query_as::<AccountRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(Account::from))
    }

    async fn find(&self, filter: &AccountFilter) -> Result<Vec<Account>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_ACCOUNTS);
        push_where(&mut builder, filter);
        builder.push(" ORDER BY inserted_at, user_id");

        let rows = builder
            .build_query_as::<AccountRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn insert_one(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts (user_id, email, first_name, last_name, user_name, password, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.user_name)
        .bind(&account.password)
        .bind(&account.role)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(account_id = %account.account_id, "inserted account");
        Ok(())
    }

    async fn update_many(
        &self,
        filter: &AccountFilter,
        update: &PartialAccount,
    ) -> Result<u64, StoreError> {
        // Account ID and user name are fixed after creation.
        let assignments: Vec<(&str, &String)> = [
            ("email", update.email.as_ref()),
            ("first_name", update.first_name.as_ref()),
            ("last_name", update.last_name.as_ref()),
            ("password", update.password.as_ref()),
            ("role", update.role.as_ref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect();

        if assignments.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM accounts");
            push_where(&mut builder, filter);
            let matched: i64 = builder
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            return Ok(matched.unsigned_abs());
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE accounts SET ");
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column).push(" = ").push_bind(value.clone());
        }
        push_where(&mut builder, filter);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, filter: &AccountFilter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM accounts");
        push_where(&mut builder, filter);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
