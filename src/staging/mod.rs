//! Staging Store: SQLite persistence for batches and their staged rows.
//!
//! A batch header and all of its rows are written as one transaction:
//! either everything lands or nothing does. Row reads are always scoped by
//! `batch_id`, so review queries can never leak rows across batches.
//!
//! Storage notes: ids and timestamps are stored as TEXT (uuid / RFC 3339),
//! monetary amounts as canonical decimal TEXT, dates as ISO `%Y-%m-%d`, and
//! the per-row error list as a JSON array. Amount columns stay TEXT because
//! SQLite has no exact decimal type.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::batch::ParseOutcome;
use crate::error::{StoreError, StoreResult};
use crate::models::{BatchStatus, ImportBatch, StagedTransaction};

/// SQLite-backed staging store.
#[derive(Debug, Clone)]
pub struct StagingStore {
    pool: SqlitePool,
}

impl StagingStore {
    /// Open (creating if missing) a database file and initialize the schema.
    pub async fn open(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database, for tests and dry runs.
    ///
    /// An in-memory SQLite database exists per connection, so the pool is
    /// pinned to a single connection.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// The underlying pool, shared with the commit engine.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist yet.
    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS import_batches (
                id TEXT PRIMARY KEY,
                source_company TEXT NOT NULL,
                file_name TEXT NOT NULL,
                uploaded_by TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                strict_mode INTEGER NOT NULL,
                status TEXT NOT NULL,
                total_rows INTEGER NOT NULL,
                valid_rows INTEGER NOT NULL,
                error_rows INTEGER NOT NULL,
                committed_at TEXT,
                committed_by TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS staged_transactions (
                batch_id TEXT NOT NULL REFERENCES import_batches(id) ON DELETE CASCADE,
                row_number INTEGER NOT NULL,
                transaction_number TEXT NOT NULL DEFAULT '',
                customer_number TEXT NOT NULL DEFAULT '',
                customer_name TEXT NOT NULL DEFAULT '',
                product_code TEXT NOT NULL DEFAULT '',
                product_description TEXT NOT NULL DEFAULT '',
                quantity INTEGER,
                sales_amount TEXT,
                cost_of_sales TEXT,
                transaction_date TEXT,
                validation_errors TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (batch_id, row_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sales_transactions (
                id TEXT PRIMARY KEY,
                source_company TEXT NOT NULL,
                transaction_number TEXT NOT NULL,
                customer_number TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                product_code TEXT NOT NULL,
                product_description TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                sales_amount TEXT NOT NULL,
                cost_of_sales TEXT NOT NULL,
                transaction_date TEXT NOT NULL,
                batch_id TEXT NOT NULL,
                imported_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist a parse result: batch header plus all rows, atomically.
    ///
    /// A `Failed` parse is never staged; callers report it without a store
    /// round-trip.
    pub async fn persist(&self, outcome: &ParseOutcome) -> StoreResult<()> {
        if outcome.batch.status == BatchStatus::Failed {
            return Err(StoreError::FailedParse);
        }

        let batch = &outcome.batch;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO import_batches (
                id, source_company, file_name, uploaded_by, uploaded_at,
                strict_mode, status, total_rows, valid_rows, error_rows
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch.id.to_string())
        .bind(&batch.source_company)
        .bind(&batch.file_name)
        .bind(&batch.uploaded_by)
        .bind(batch.uploaded_at.to_rfc3339())
        .bind(batch.strict_mode)
        .bind(batch.status.as_str())
        .bind(batch.total_rows)
        .bind(batch.valid_rows)
        .bind(batch.error_rows)
        .execute(&mut *tx)
        .await?;

        for row in &outcome.rows {
            sqlx::query(
                r#"
                INSERT INTO staged_transactions (
                    batch_id, row_number, transaction_number, customer_number,
                    customer_name, product_code, product_description, quantity,
                    sales_amount, cost_of_sales, transaction_date, validation_errors
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.batch_id.to_string())
            .bind(row.row_number)
            .bind(&row.transaction_number)
            .bind(&row.customer_number)
            .bind(&row.customer_name)
            .bind(&row.product_code)
            .bind(&row.product_description)
            .bind(row.quantity)
            .bind(row.sales_amount.map(|d| d.to_string()))
            .bind(row.cost_of_sales.map(|d| d.to_string()))
            .bind(row.transaction_date.map(|d| d.format("%Y-%m-%d").to_string()))
            .bind(serde_json::to_string(&row.validation_errors)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(batch_id = %batch.id, rows = outcome.rows.len(), "staged batch");
        Ok(())
    }

    /// Fetch a batch header.
    pub async fn batch(&self, id: Uuid) -> StoreResult<Option<ImportBatch>> {
        let row = sqlx::query("SELECT * FROM import_batches WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| batch_from_row(&r)).transpose()
    }

    /// List batch headers, newest first, optionally filtered by company.
    pub async fn batches(&self, company: Option<&str>) -> StoreResult<Vec<ImportBatch>> {
        let rows = match company {
            Some(code) => {
                sqlx::query(
                    "SELECT * FROM import_batches WHERE source_company = ? \
                     ORDER BY uploaded_at DESC, id",
                )
                .bind(code.trim().to_lowercase())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM import_batches ORDER BY uploaded_at DESC, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(batch_from_row).collect()
    }

    /// One page of staged rows for a batch, ordered by row number.
    pub async fn rows_page(
        &self,
        batch_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<StagedTransaction>> {
        let rows = sqlx::query(
            "SELECT * FROM staged_transactions WHERE batch_id = ? \
             ORDER BY row_number LIMIT ? OFFSET ?",
        )
        .bind(batch_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(staged_from_row).collect()
    }

    /// Number of staged rows held for a batch.
    pub async fn row_count(&self, batch_id: Uuid) -> StoreResult<u32> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM staged_transactions WHERE batch_id = ?")
                .bind(batch_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u32)
    }

    /// Delete a batch header and all of its rows atomically.
    ///
    /// Only reviewable batches can be deleted; a committed batch is an audit
    /// record and stays. Returns whether a batch was actually removed.
    pub async fn delete_batch(&self, batch_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM import_batches WHERE id = ? AND status IN ('Staged', 'CompletedWithErrors')",
        )
        .bind(batch_id.to_string())
        .execute(&mut *tx)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            // Foreign keys may be off on some connections; delete explicitly.
            sqlx::query("DELETE FROM staged_transactions WHERE batch_id = ?")
                .bind(batch_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// Number of production rows written from a batch.
    pub async fn production_count(&self, batch_id: Uuid) -> StoreResult<u32> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales_transactions WHERE batch_id = ?")
                .bind(batch_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u32)
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn parse_uuid(column: &'static str, value: String) -> StoreResult<Uuid> {
    Uuid::parse_str(&value).map_err(|_| StoreError::Corrupt { column, value })
}

fn parse_timestamp(
    column: &'static str,
    value: String,
) -> StoreResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|_| StoreError::Corrupt { column, value })
}

fn batch_from_row(row: &SqliteRow) -> StoreResult<ImportBatch> {
    let status_code: String = row.try_get("status")?;
    let status = BatchStatus::from_code(&status_code)
        .ok_or(StoreError::Corrupt { column: "status", value: status_code })?;

    let committed_at: Option<String> = row.try_get("committed_at")?;

    Ok(ImportBatch {
        id: parse_uuid("id", row.try_get("id")?)?,
        source_company: row.try_get("source_company")?,
        file_name: row.try_get("file_name")?,
        uploaded_by: row.try_get("uploaded_by")?,
        uploaded_at: parse_timestamp("uploaded_at", row.try_get("uploaded_at")?)?,
        strict_mode: row.try_get("strict_mode")?,
        status,
        total_rows: row.try_get::<i64, _>("total_rows")? as u32,
        valid_rows: row.try_get::<i64, _>("valid_rows")? as u32,
        error_rows: row.try_get::<i64, _>("error_rows")? as u32,
        committed_at: committed_at
            .map(|t| parse_timestamp("committed_at", t))
            .transpose()?,
        committed_by: row.try_get("committed_by")?,
    })
}

fn staged_from_row(row: &SqliteRow) -> StoreResult<StagedTransaction> {
    let errors_json: String = row.try_get("validation_errors")?;
    let validation_errors: Vec<String> = serde_json::from_str(&errors_json)?;

    let amount = |column: &'static str, value: Option<String>| {
        value
            .map(|v| {
                rust_decimal::Decimal::from_str(&v)
                    .map_err(|_| StoreError::Corrupt { column, value: v })
            })
            .transpose()
    };

    let date: Option<String> = row.try_get("transaction_date")?;
    let transaction_date = date
        .map(|v| {
            chrono::NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| StoreError::Corrupt { column: "transaction_date", value: v })
        })
        .transpose()?;

    Ok(StagedTransaction {
        batch_id: parse_uuid("batch_id", row.try_get("batch_id")?)?,
        row_number: row.try_get::<i64, _>("row_number")? as u32,
        transaction_number: row.try_get("transaction_number")?,
        customer_number: row.try_get("customer_number")?,
        customer_name: row.try_get("customer_name")?,
        product_code: row.try_get("product_code")?,
        product_description: row.try_get("product_description")?,
        quantity: row.try_get::<Option<i64>, _>("quantity")?.map(|q| q as u32),
        sales_amount: amount("sales_amount", row.try_get("sales_amount")?)?,
        cost_of_sales: amount("cost_of_sales", row.try_get("cost_of_sales")?)?,
        transaction_date,
        validation_errors,
    })
}
