//! Domain models for the salestage import pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`BatchStatus`] - Batch lifecycle states
//! - [`ImportBatch`] - One upload attempt (header + counts)
//! - [`RowOutcome`] - Validation verdict for a single row, decided once
//! - [`NormalizedRow`] - Typed fields of a valid row
//! - [`StagedTransaction`] - A staged row as held for operator review
//! - [`BatchSummary`] - Read-side view of a batch
//! - [`PagedResult`] - Deterministic pagination envelope

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// =============================================================================
// Batch Status
// =============================================================================

/// Lifecycle state of an import batch.
///
/// `Staged` and `CompletedWithErrors` are reviewable; `Failed`, `Committed`
/// and `Cancelled` are terminal. `Failed` batches are produced directly by
/// the parser under strict mode and never enter staging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchStatus {
    /// All rows valid, awaiting operator review.
    Staged,
    /// Some rows invalid (lenient mode); valid rows can still be committed.
    CompletedWithErrors,
    /// Rejected as a whole (strict mode with errors, or unreadable input).
    Failed,
    /// Valid rows copied to production; one-way.
    Committed,
    /// Discarded by the operator; staged rows purged.
    Cancelled,
}

impl BatchStatus {
    /// Status code as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staged => "Staged",
            Self::CompletedWithErrors => "CompletedWithErrors",
            Self::Failed => "Failed",
            Self::Committed => "Committed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Parse a stored status code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Staged" => Some(Self::Staged),
            "CompletedWithErrors" => Some(Self::CompletedWithErrors),
            "Failed" => Some(Self::Failed),
            "Committed" => Some(Self::Committed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether commit/cancel may still act on the batch.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Staged | Self::CompletedWithErrors)
    }

    /// Whether the batch can never change again.
    pub fn is_terminal(&self) -> bool {
        !self.is_reviewable()
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Import Batch
// =============================================================================

/// Header record for one upload attempt.
///
/// Counts are computed at parse time and never change; `committed_at` and
/// `committed_by` are set only by a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    /// Unique id, assigned at parse time.
    pub id: Uuid,
    /// Company code from the configured registry.
    pub source_company: String,
    /// Original file name, for provenance.
    pub file_name: String,
    /// Acting user who uploaded the file.
    pub uploaded_by: String,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
    /// Whether any invalid row rejects the whole batch.
    pub strict_mode: bool,
    /// Current lifecycle state.
    pub status: BatchStatus,
    /// Total data rows in the file (blank rows excluded).
    pub total_rows: u32,
    /// Rows that passed validation.
    pub valid_rows: u32,
    /// Rows that failed validation. `valid_rows + error_rows == total_rows`.
    pub error_rows: u32,
    /// Set on commit.
    pub committed_at: Option<DateTime<Utc>>,
    /// Set on commit.
    pub committed_by: Option<String>,
}

// =============================================================================
// Row Outcome
// =============================================================================

/// Raw field values of one data row, keyed by normalized header.
pub type RawFields = HashMap<String, String>;

/// Typed fields of a row that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub transaction_number: String,
    pub customer_number: String,
    pub customer_name: String,
    pub product_code: String,
    pub product_description: String,
    pub quantity: u32,
    pub sales_amount: Decimal,
    /// May be negative to represent credits.
    pub cost_of_sales: Decimal,
    pub transaction_date: NaiveDate,
}

/// A row that failed validation, kept with its raw text for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidRow {
    /// Raw field text as parsed, never re-interpreted.
    pub raw: RawFields,
    /// Ordered, human-readable field errors.
    pub errors: Vec<String>,
}

/// Validation verdict for a single row, decided once at validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RowOutcome {
    Valid(NormalizedRow),
    Invalid(InvalidRow),
}

impl RowOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The row's error list; empty for valid rows.
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(row) => &row.errors,
        }
    }
}

// =============================================================================
// Staged Transaction
// =============================================================================

/// A staged row as held for operator review.
///
/// For valid rows every typed field is `Some` and `validation_errors` is
/// empty. For invalid rows the string fields carry the raw text and the
/// unparsable typed fields are `None`; the offending raw values are quoted
/// in the error messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedTransaction {
    pub batch_id: Uuid,
    /// 1-based position in the source file, unique within the batch.
    pub row_number: u32,
    pub transaction_number: String,
    pub customer_number: String,
    pub customer_name: String,
    pub product_code: String,
    pub product_description: String,
    pub quantity: Option<u32>,
    pub sales_amount: Option<Decimal>,
    pub cost_of_sales: Option<Decimal>,
    pub transaction_date: Option<NaiveDate>,
    pub validation_errors: Vec<String>,
}

impl StagedTransaction {
    /// Build the staged representation of a validated row.
    pub fn from_outcome(batch_id: Uuid, row_number: u32, outcome: RowOutcome) -> Self {
        match outcome {
            RowOutcome::Valid(row) => Self {
                batch_id,
                row_number,
                transaction_number: row.transaction_number,
                customer_number: row.customer_number,
                customer_name: row.customer_name,
                product_code: row.product_code,
                product_description: row.product_description,
                quantity: Some(row.quantity),
                sales_amount: Some(row.sales_amount),
                cost_of_sales: Some(row.cost_of_sales),
                transaction_date: Some(row.transaction_date),
                validation_errors: Vec::new(),
            },
            RowOutcome::Invalid(row) => {
                let field = |name: &str| row.raw.get(name).cloned().unwrap_or_default();
                Self {
                    batch_id,
                    row_number,
                    transaction_number: field("transaction_number"),
                    customer_number: field("customer_number"),
                    customer_name: field("customer_name"),
                    product_code: field("product_code"),
                    product_description: field("product_description"),
                    quantity: None,
                    sales_amount: None,
                    cost_of_sales: None,
                    transaction_date: None,
                    validation_errors: row.errors,
                }
            }
        }
    }

    /// Whether the row is eligible for commit.
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }
}

// =============================================================================
// Read-side Views
// =============================================================================

/// Read-only view of a batch for operator review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub id: Uuid,
    pub source_company: String,
    pub file_name: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub strict_mode: bool,
    pub status: BatchStatus,
    pub total_rows: u32,
    pub valid_rows: u32,
    pub error_rows: u32,
    pub committed_at: Option<DateTime<Utc>>,
    pub committed_by: Option<String>,
}

impl From<ImportBatch> for BatchSummary {
    fn from(batch: ImportBatch) -> Self {
        Self {
            id: batch.id,
            source_company: batch.source_company,
            file_name: batch.file_name,
            uploaded_by: batch.uploaded_by,
            uploaded_at: batch.uploaded_at,
            strict_mode: batch.strict_mode,
            status: batch.status,
            total_rows: batch.total_rows,
            valid_rows: batch.valid_rows,
            error_rows: batch.error_rows,
            committed_at: batch.committed_at,
            committed_by: batch.committed_by,
        }
    }
}

/// One page of staged rows, ordered by `row_number` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// 1-based page index after clamping.
    pub page: u32,
    /// Page size after clamping.
    pub page_size: u32,
    /// Total rows across all pages.
    pub total_items: u32,
    pub total_pages: u32,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_roundtrip() {
        for status in [
            BatchStatus::Staged,
            BatchStatus::CompletedWithErrors,
            BatchStatus::Failed,
            BatchStatus::Committed,
            BatchStatus::Cancelled,
        ] {
            assert_eq!(BatchStatus::from_code(status.as_str()), Some(status));
        }
        assert_eq!(BatchStatus::from_code("Unknown"), None);
    }

    #[test]
    fn test_status_reviewability() {
        assert!(BatchStatus::Staged.is_reviewable());
        assert!(BatchStatus::CompletedWithErrors.is_reviewable());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Committed.is_terminal());
        assert!(BatchStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_staged_transaction_from_valid_outcome() {
        let batch_id = Uuid::new_v4();
        let outcome = RowOutcome::Valid(NormalizedRow {
            transaction_number: "TX-100".into(),
            customer_number: "C-9".into(),
            customer_name: "Acme".into(),
            product_code: "P-1".into(),
            product_description: "Widget".into(),
            quantity: 3,
            sales_amount: Decimal::new(1999, 2),
            cost_of_sales: Decimal::new(-500, 2),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        });

        let staged = StagedTransaction::from_outcome(batch_id, 1, outcome);
        assert!(staged.is_valid());
        assert_eq!(staged.quantity, Some(3));
        assert_eq!(staged.sales_amount, Some(Decimal::new(1999, 2)));
        assert_eq!(staged.cost_of_sales, Some(Decimal::new(-500, 2)));
    }

    #[test]
    fn test_staged_transaction_from_invalid_outcome_keeps_raw_text() {
        let mut raw = RawFields::new();
        raw.insert("transaction_number".into(), "TX-101".into());
        raw.insert("customer_name".into(), "Acme".into());

        let outcome = RowOutcome::Invalid(InvalidRow {
            raw,
            errors: vec!["quantity \"abc\" must be a non-negative integer".into()],
        });

        let staged = StagedTransaction::from_outcome(Uuid::new_v4(), 2, outcome);
        assert!(!staged.is_valid());
        assert_eq!(staged.transaction_number, "TX-101");
        assert_eq!(staged.quantity, None);
        assert_eq!(staged.validation_errors.len(), 1);
    }
}
