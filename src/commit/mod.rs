//! Commit Engine: the one-way state transitions out of staging.
//!
//! Both transitions run inside a single database transaction, and the
//! status flip is a conditional UPDATE restricted to the reviewable states.
//! That conditional write is the compare-and-swap: when two calls race on
//! the same batch, exactly one flips the row and the other reads the
//! now-settled status and gets a typed error. Production rows are copied in
//! the same transaction as the flip, so a failure partway rolls everything
//! back and the batch stays reviewable.
//!
//! ```text
//!   Staged ────────────────┬─ commit ─> Committed   (terminal)
//!   CompletedWithErrors ───┤
//!                          └─ cancel ─> Cancelled   (terminal, rows purged)
//! ```
//!
//! `Failed` batches never enter staging, so the engine reports them as
//! `NotFound`; re-upload is the only retry path.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::{CommitError, CommitResult, StoreError};
use crate::models::BatchStatus;
use crate::staging::StagingStore;

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub batch_id: Uuid,
    /// Valid rows copied into the production table.
    pub committed_rows: u32,
    pub committed_at: DateTime<Utc>,
}

/// State-transition authority over staged batches.
#[derive(Debug, Clone)]
pub struct CommitEngine {
    pool: SqlitePool,
}

impl CommitEngine {
    /// Build an engine over the staging store's pool.
    pub fn new(store: &StagingStore) -> Self {
        Self { pool: store.pool().clone() }
    }

    /// Commit a batch: copy its valid rows into production and seal it.
    ///
    /// Exactly-once per batch: a concurrent second call observes
    /// [`CommitError::AlreadyCommitted`] and must not retry.
    pub async fn commit(&self, batch_id: Uuid, committed_by: &str) -> CommitResult<CommitReceipt> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        let now = Utc::now();

        // The compare-and-swap: only a reviewable batch flips. Running the
        // write first also takes the row lock before anything is read.
        let flipped = sqlx::query(
            "UPDATE import_batches \
             SET status = 'Committed', committed_at = ?, committed_by = ? \
             WHERE id = ? AND status IN ('Staged', 'CompletedWithErrors')",
        )
        .bind(now.to_rfc3339())
        .bind(committed_by)
        .bind(batch_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if flipped.rows_affected() == 0 {
            let status = Self::settled_status(&mut tx, batch_id).await?;
            return Err(match status {
                None => CommitError::NotFound(batch_id),
                Some(BatchStatus::Committed) => CommitError::AlreadyCommitted(batch_id),
                Some(status) => CommitError::InvalidState { batch_id, status },
            });
        }

        let source_company: String =
            sqlx::query_scalar("SELECT source_company FROM import_batches WHERE id = ?")
                .bind(batch_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from)?;

        // Copy, not move: each valid staged row becomes a new production
        // row; the staged copy is retained for audit.
        let staged = sqlx::query(
            "SELECT transaction_number, customer_number, customer_name, product_code, \
                    product_description, quantity, sales_amount, cost_of_sales, transaction_date \
             FROM staged_transactions \
             WHERE batch_id = ? AND validation_errors = '[]' \
             ORDER BY row_number",
        )
        .bind(batch_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        for row in &staged {
            sqlx::query(
                "INSERT INTO sales_transactions ( \
                     id, source_company, transaction_number, customer_number, customer_name, \
                     product_code, product_description, quantity, sales_amount, cost_of_sales, \
                     transaction_date, batch_id, imported_at \
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&source_company)
            .bind(row.get::<String, _>("transaction_number"))
            .bind(row.get::<String, _>("customer_number"))
            .bind(row.get::<String, _>("customer_name"))
            .bind(row.get::<String, _>("product_code"))
            .bind(row.get::<String, _>("product_description"))
            .bind(row.get::<i64, _>("quantity"))
            .bind(row.get::<String, _>("sales_amount"))
            .bind(row.get::<String, _>("cost_of_sales"))
            .bind(row.get::<String, _>("transaction_date"))
            .bind(batch_id.to_string())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;

        let committed_rows = staged.len() as u32;
        info!(batch_id = %batch_id, committed_rows, committed_by, "batch committed");

        Ok(CommitReceipt { batch_id, committed_rows, committed_at: now })
    }

    /// Cancel a batch: purge its staged rows and seal it.
    ///
    /// A second cancel on an already-settled batch is a typed error, not a
    /// silent success.
    pub async fn cancel(&self, batch_id: Uuid) -> CommitResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let flipped = sqlx::query(
            "UPDATE import_batches SET status = 'Cancelled' \
             WHERE id = ? AND status IN ('Staged', 'CompletedWithErrors')",
        )
        .bind(batch_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if flipped.rows_affected() == 0 {
            let status = Self::settled_status(&mut tx, batch_id).await?;
            return Err(match status {
                None => CommitError::NotFound(batch_id),
                Some(status) => CommitError::InvalidState { batch_id, status },
            });
        }

        sqlx::query("DELETE FROM staged_transactions WHERE batch_id = ?")
            .bind(batch_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;

        info!(batch_id = %batch_id, "batch cancelled");
        Ok(())
    }

    /// Read the status that beat us to the flip.
    async fn settled_status(
        tx: &mut Transaction<'_, Sqlite>,
        batch_id: Uuid,
    ) -> CommitResult<Option<BatchStatus>> {
        let code: Option<String> =
            sqlx::query_scalar("SELECT status FROM import_batches WHERE id = ?")
                .bind(batch_id.to_string())
                .fetch_optional(&mut **tx)
                .await
                .map_err(StoreError::from)?;

        match code {
            None => Ok(None),
            Some(code) => BatchStatus::from_code(&code)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt { column: "status", value: code }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{parse_upload, ParseOutcome};
    use crate::config::ImportConfig;

    const HEADER: &str = "transaction_number,customer_number,customer_name,product_code,product_description,quantity,sales_amount,cost_of_sales,transaction_date";

    fn upload(rows: &[&str]) -> ParseOutcome {
        let mut content = HEADER.to_string();
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        parse_upload(
            content.as_bytes(),
            "sales.csv",
            "us",
            "operator",
            false,
            &ImportConfig::default(),
        )
        .unwrap()
    }

    fn valid_row(n: u32) -> String {
        format!("TX-{n},C-1,Acme,P-1,Widget,2,10.50,4.25,03/15/2024")
    }

    async fn staged_batch(rows: &[&str]) -> (StagingStore, CommitEngine, Uuid) {
        let store = StagingStore::open_in_memory().await.unwrap();
        let outcome = upload(rows);
        store.persist(&outcome).await.unwrap();
        let engine = CommitEngine::new(&store);
        (store, engine, outcome.batch.id)
    }

    #[tokio::test]
    async fn test_commit_copies_only_valid_rows() {
        let bad = "TX-9,C-1,Acme,P-1,Widget,lots,10.00,4.00,03/15/2024";
        let (store, engine, batch_id) =
            staged_batch(&[&valid_row(1), bad, &valid_row(3)]).await;

        let receipt = engine.commit(batch_id, "reviewer").await.unwrap();
        assert_eq!(receipt.committed_rows, 2);
        assert_eq!(store.production_count(batch_id).await.unwrap(), 2);

        let batch = store.batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Committed);
        assert_eq!(batch.committed_by.as_deref(), Some("reviewer"));
        assert!(batch.committed_at.is_some());

        // Staged rows are retained for audit.
        assert_eq!(store.row_count(batch_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_second_commit_reports_already_committed() {
        let (store, engine, batch_id) = staged_batch(&[&valid_row(1)]).await;

        engine.commit(batch_id, "reviewer").await.unwrap();
        let err = engine.commit(batch_id, "reviewer").await.unwrap_err();

        assert!(matches!(err, CommitError::AlreadyCommitted(id) if id == batch_id));
        // Production rows are not duplicated.
        assert_eq!(store.production_count(batch_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_purges_rows_and_blocks_commit() {
        let (store, engine, batch_id) = staged_batch(&[&valid_row(1), &valid_row(2)]).await;

        engine.cancel(batch_id).await.unwrap();

        let batch = store.batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Cancelled);
        assert_eq!(store.row_count(batch_id).await.unwrap(), 0);

        let err = engine.commit(batch_id, "reviewer").await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::InvalidState { status: BatchStatus::Cancelled, .. }
        ));
    }

    #[tokio::test]
    async fn test_second_cancel_is_a_typed_error() {
        let (_store, engine, batch_id) = staged_batch(&[&valid_row(1)]).await;

        engine.cancel(batch_id).await.unwrap();
        let err = engine.cancel(batch_id).await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::InvalidState { status: BatchStatus::Cancelled, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_commit_is_invalid_state() {
        let (_store, engine, batch_id) = staged_batch(&[&valid_row(1)]).await;

        engine.commit(batch_id, "reviewer").await.unwrap();
        let err = engine.cancel(batch_id).await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::InvalidState { status: BatchStatus::Committed, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_batch_is_not_found() {
        let (_store, engine, _batch_id) = staged_batch(&[&valid_row(1)]).await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            engine.commit(missing, "reviewer").await.unwrap_err(),
            CommitError::NotFound(id) if id == missing
        ));
        assert!(matches!(
            engine.cancel(missing).await.unwrap_err(),
            CommitError::NotFound(id) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_committed_fields_copied_field_for_field() {
        let (store, engine, batch_id) = staged_batch(&[&valid_row(7)]).await;
        engine.commit(batch_id, "reviewer").await.unwrap();

        let row = sqlx::query("SELECT * FROM sales_transactions WHERE batch_id = ?")
            .bind(batch_id.to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();

        assert_eq!(row.get::<String, _>("transaction_number"), "TX-7");
        assert_eq!(row.get::<String, _>("source_company"), "us");
        assert_eq!(row.get::<i64, _>("quantity"), 2);
        assert_eq!(row.get::<String, _>("sales_amount"), "10.50");
        assert_eq!(row.get::<String, _>("transaction_date"), "2024-03-15");
    }
}
