use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    NewTransaction, Transaction, TransactionPatch, TransactionType, DATE_FORMAT,
};

use super::{Direction, OrderBy, StoreError, TransactionStore, MIGRATION_001_INITIAL};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, type, amount_cents, category, date, description, created_at";

/// SQLite-backed transaction store.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL, e.g. `sqlite:fintrack.db`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| store_error("connect to database", e))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("run migration 001", e))?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self, StoreError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// The underlying pool, shared with other SQLite-backed components.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("look up transaction", e))?;
        Ok(row.is_some())
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction, StoreError> {
        let kind_str: String = column(row, "type")?;
        let date_str: String = column(row, "date")?;
        let created_at_str: String = column(row, "created_at")?;

        Ok(Transaction {
            id: column(row, "id")?,
            user_id: column(row, "user_id")?,
            kind: TransactionType::from_str(&kind_str).ok_or_else(|| {
                StoreError::InvalidRecord(format!("invalid transaction type: {kind_str}"))
            })?,
            amount: column(row, "amount_cents")?,
            category: column(row, "category")?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .map_err(|_| StoreError::InvalidRecord(format!("invalid date: {date_str}")))?,
            description: column(row, "description")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map_err(|_| {
                    StoreError::InvalidRecord(format!("invalid created_at: {created_at_str}"))
                })?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl TransactionStore for Repository {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let created = transaction.into_transaction(Uuid::new_v4().to_string(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, type, amount_cents, category, date, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&created.user_id)
        .bind(created.kind.as_str())
        .bind(created.amount)
        .bind(&created.category)
        .bind(created.date.format(DATE_FORMAT).to_string())
        .bind(&created.description)
        .bind(created.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("save transaction", e))?;

        tracing::debug!(id = %created.id, user_id = %created.user_id, "transaction created");
        Ok(created)
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("fetch transaction", e))?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    async fn query_by_user(
        &self,
        user_id: &str,
        order_by: OrderBy,
        direction: Direction,
    ) -> Result<Vec<Transaction>, StoreError> {
        let column = match order_by {
            OrderBy::Date => "date",
            OrderBy::CreatedAt => "created_at",
        };
        let direction = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };

        // Dates are stored as ISO text, so lexical order is chronological
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ? ORDER BY {column} {direction}, rowid {direction}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list transactions", e))?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return if self.exists(id).await? {
                Ok(())
            } else {
                Err(StoreError::NotFound(id.to_string()))
            };
        }

        // Build the SET clause from the fields present in the patch
        let mut assignments = Vec::new();
        if patch.kind.is_some() {
            assignments.push("type = ?");
        }
        if patch.amount.is_some() {
            assignments.push("amount_cents = ?");
        }
        if patch.category.is_some() {
            assignments.push("category = ?");
        }
        if patch.date.is_some() {
            assignments.push("date = ?");
        }
        if patch.description.is_some() {
            assignments.push("description = ?");
        }
        let query = format!(
            "UPDATE transactions SET {} WHERE id = ?",
            assignments.join(", ")
        );

        let date_str = patch.date.map(|d| d.format(DATE_FORMAT).to_string());

        let mut sql_query = sqlx::query(&query);
        if let Some(kind) = patch.kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        if let Some(amount) = patch.amount {
            sql_query = sql_query.bind(amount);
        }
        if let Some(category) = &patch.category {
            sql_query = sql_query.bind(category);
        }
        if let Some(date) = &date_str {
            sql_query = sql_query.bind(date);
        }
        if let Some(description) = &patch.description {
            sql_query = sql_query.bind(description);
        }

        let result = sql_query
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("update transaction", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("delete transaction", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::InvalidRecord(format!("column {name}: {e}")))
}

// SQLite primary result codes for access failures
const SQLITE_PERM: i32 = 3;
const SQLITE_READONLY: i32 = 8;
const SQLITE_AUTH: i32 = 23;

/// Translate a driver error into the store's error taxonomy.
pub(crate) fn store_error(action: &str, err: sqlx::Error) -> StoreError {
    tracing::warn!("Failed to {action}: {err}");
    match &err {
        sqlx::Error::Database(db_err) => {
            let primary_code = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            match primary_code {
                Some(SQLITE_PERM | SQLITE_READONLY | SQLITE_AUTH) => {
                    StoreError::PermissionDenied(format!("failed to {action}: {err}"))
                }
                _ => StoreError::Unreachable(format!("failed to {action}: {err}")),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::InvalidRecord(format!("failed to {action}: {err}"))
        }
        _ => StoreError::Unreachable(format!("failed to {action}: {err}")),
    }
}
