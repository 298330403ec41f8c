//! REST API types for review clients.
//!
//! Everything serializes as camelCase JSON. Monetary amounts go out as
//! decimal strings so review clients never touch binary floats.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::batch::ParseOutcome;
use crate::commit::CommitReceipt;
use crate::models::{BatchStatus, BatchSummary, PagedResult, StagedTransaction};

/// Response sent after an upload was parsed (and, unless it failed, staged).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Batch identifier, assigned at parse time.
    pub batch_id: String,

    /// Batch status after parsing: `Staged`, `CompletedWithErrors` or `Failed`.
    pub status: BatchStatus,

    pub total_rows: u32,
    pub valid_row_count: u32,
    pub error_row_count: u32,

    /// Per-row validation errors, in row order.
    pub errors: Vec<RowErrorBody>,

    /// Detection metadata for the upload report.
    pub file_info: FileInfo,
}

/// Validation errors of a single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowErrorBody {
    pub row_number: u32,
    pub errors: Vec<String>,
}

/// Detected properties of the uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub encoding: String,
    pub delimiter: String,
}

impl From<&ParseOutcome> for UploadResponse {
    fn from(outcome: &ParseOutcome) -> Self {
        let batch = &outcome.batch;
        UploadResponse {
            batch_id: batch.id.to_string(),
            status: batch.status,
            total_rows: batch.total_rows,
            valid_row_count: batch.valid_rows,
            error_row_count: batch.error_rows,
            errors: outcome
                .row_errors()
                .into_iter()
                .map(|(row_number, errors)| RowErrorBody { row_number, errors })
                .collect(),
            file_info: FileInfo {
                encoding: outcome.encoding.clone(),
                delimiter: outcome.delimiter.to_string(),
            },
        }
    }
}

/// Read-side batch view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummaryBody {
    pub batch_id: String,
    pub source_company: String,
    pub file_name: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
    pub strict_mode: bool,
    pub status: BatchStatus,
    pub total_rows: u32,
    pub valid_row_count: u32,
    pub error_row_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_by: Option<String>,
}

impl From<BatchSummary> for BatchSummaryBody {
    fn from(summary: BatchSummary) -> Self {
        Self {
            batch_id: summary.id.to_string(),
            source_company: summary.source_company,
            file_name: summary.file_name,
            uploaded_by: summary.uploaded_by,
            uploaded_at: summary.uploaded_at.to_rfc3339(),
            strict_mode: summary.strict_mode,
            status: summary.status,
            total_rows: summary.total_rows,
            valid_row_count: summary.valid_rows,
            error_row_count: summary.error_rows,
            committed_at: summary.committed_at.map(|t| t.to_rfc3339()),
            committed_by: summary.committed_by,
        }
    }
}

/// One staged row, as shown to the reviewing operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedTransactionBody {
    pub row_number: u32,
    pub transaction_number: String,
    pub customer_number: String,
    pub customer_name: String,
    pub product_code: String,
    pub product_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_of_sales: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    pub valid: bool,
    pub validation_errors: Vec<String>,
}

impl From<StagedTransaction> for StagedTransactionBody {
    fn from(row: StagedTransaction) -> Self {
        let valid = row.is_valid();
        Self {
            row_number: row.row_number,
            transaction_number: row.transaction_number,
            customer_number: row.customer_number,
            customer_name: row.customer_name,
            product_code: row.product_code,
            product_description: row.product_description,
            quantity: row.quantity,
            sales_amount: row.sales_amount.map(|d| d.to_string()),
            cost_of_sales: row.cost_of_sales.map(|d| d.to_string()),
            transaction_date: row.transaction_date.map(|d| d.format("%Y-%m-%d").to_string()),
            valid,
            validation_errors: row.validation_errors,
        }
    }
}

/// Pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedBody<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub total_pages: u32,
}

impl From<PagedResult<StagedTransaction>> for PagedBody<StagedTransactionBody> {
    fn from(page: PagedResult<StagedTransaction>) -> Self {
        Self {
            items: page.items.into_iter().map(StagedTransactionBody::from).collect(),
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages,
        }
    }
}

/// Response to a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub success: bool,
    pub committed_row_count: u32,
    pub committed_at: String,
}

impl From<CommitReceipt> for CommitResponse {
    fn from(receipt: CommitReceipt) -> Self {
        Self {
            success: true,
            committed_row_count: receipt.committed_rows,
            committed_at: receipt.committed_at.to_rfc3339(),
        }
    }
}

/// Response to a successful cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
}

/// Commit request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub committed_by: String,
}

/// Create an error response body.
pub fn error_response(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::parse_upload;
    use crate::config::ImportConfig;

    #[test]
    fn test_upload_response_from_outcome() {
        let csv = "transaction_number,customer_number,customer_name,product_code,product_description,quantity,sales_amount,cost_of_sales,transaction_date\n\
                   TX-1,C-1,Acme,P-1,Widget,2,10.00,4.00,03/15/2024\n\
                   TX-2,C-1,Acme,P-1,Widget,x,10.00,4.00,03/15/2024";
        let outcome = parse_upload(
            csv.as_bytes(),
            "sales.csv",
            "us",
            "op",
            false,
            &ImportConfig::default(),
        )
        .unwrap();

        let body = UploadResponse::from(&outcome);
        assert_eq!(body.status, BatchStatus::CompletedWithErrors);
        assert_eq!(body.total_rows, 2);
        assert_eq!(body.errors.len(), 1);
        assert_eq!(body.errors[0].row_number, 2);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["validRowCount"], 1);
        assert_eq!(json["errorRowCount"], 1);
        assert_eq!(json["status"], "CompletedWithErrors");
    }

    #[test]
    fn test_staged_transaction_body_serializes_money_as_strings() {
        let csv = "transaction_number,customer_number,customer_name,product_code,product_description,quantity,sales_amount,cost_of_sales,transaction_date\n\
                   TX-1,C-1,Acme,P-1,Widget,2,10.50,-4.25,03/15/2024";
        let outcome = parse_upload(
            csv.as_bytes(),
            "sales.csv",
            "us",
            "op",
            false,
            &ImportConfig::default(),
        )
        .unwrap();

        let body = StagedTransactionBody::from(outcome.rows[0].clone());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["salesAmount"], "10.50");
        assert_eq!(json["costOfSales"], "-4.25");
        assert_eq!(json["transactionDate"], "2024-03-15");
        assert_eq!(json["valid"], true);
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("Unknown source company: 'zz'");
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("zz"));
    }
}
