//! Batch Query Service: read-only review access over staged batches.
//!
//! Everything here is pagination and view mapping; writes stay in the
//! staging store and commit engine. Page bounds are clamped so a review
//! client can never trigger an unbounded scan, and rows always come back
//! ordered by `row_number` for deterministic review.

use uuid::Uuid;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::{QueryError, QueryResult};
use crate::models::{BatchSummary, PagedResult, StagedTransaction};
use crate::staging::StagingStore;

/// Read-only review queries over the staging store.
#[derive(Debug, Clone)]
pub struct BatchQueries {
    store: StagingStore,
}

impl BatchQueries {
    pub fn new(store: &StagingStore) -> Self {
        Self { store: store.clone() }
    }

    /// Summary of one batch.
    pub async fn status(&self, batch_id: Uuid) -> QueryResult<BatchSummary> {
        let batch = self
            .store
            .batch(batch_id)
            .await?
            .ok_or(QueryError::NotFound(batch_id))?;
        Ok(batch.into())
    }

    /// One page of a batch's staged rows, ordered by row number.
    ///
    /// `page` is clamped to at least 1 and `page_size` to
    /// `1..=MAX_PAGE_SIZE`; omitted values fall back to the defaults.
    pub async fn transactions(
        &self,
        batch_id: Uuid,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> QueryResult<PagedResult<StagedTransaction>> {
        // Reject unknown batches rather than returning an empty page.
        if self.store.batch(batch_id).await?.is_none() {
            return Err(QueryError::NotFound(batch_id));
        }

        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(page_size);

        let total_items = self.store.row_count(batch_id).await?;
        let items = self.store.rows_page(batch_id, page_size, offset).await?;
        let total_pages = total_items.div_ceil(page_size);

        Ok(PagedResult { items, page, page_size, total_items, total_pages })
    }

    /// All batch summaries, newest first, optionally filtered by company.
    pub async fn list(&self, company: Option<&str>) -> QueryResult<Vec<BatchSummary>> {
        let batches = self.store.batches(company).await?;
        Ok(batches.into_iter().map(BatchSummary::from).collect())
    }
}
