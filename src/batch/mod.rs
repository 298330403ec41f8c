//! Batch Parser: upload bytes to a parsed, validated, countable batch.
//!
//! Combines the CSV parser and the row validator into the in-memory parse
//! result the staging store persists. Input guards (file type, size cap,
//! company code) run before any row is read; a rejected upload never gets a
//! batch id. Parsing itself has no persistence side effects.
//!
//! Batch status decision:
//!
//! - no invalid rows -> `Staged`
//! - invalid rows, strict mode -> `Failed` (nothing will be persisted)
//! - invalid rows, lenient mode -> `CompletedWithErrors` (invalid rows are
//!   staged alongside valid ones, flagged and excluded from commit)

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::error::{UploadError, UploadResult};
use crate::models::{BatchStatus, ImportBatch, StagedTransaction};
use crate::parser;
use crate::validation::validate_row;

/// In-memory result of parsing one upload.
///
/// `rows` is populated even when `batch.status` is `Failed` so the caller
/// can report the per-row errors; the staging store refuses failed batches.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub batch: ImportBatch,
    /// All rows, valid and invalid, in source order.
    pub rows: Vec<StagedTransaction>,
    /// Detected encoding, for the upload report.
    pub encoding: String,
    /// Detected delimiter, for the upload report.
    pub delimiter: char,
}

impl ParseOutcome {
    /// Per-row error lists, for the upload response.
    pub fn row_errors(&self) -> Vec<(u32, Vec<String>)> {
        self.rows
            .iter()
            .filter(|r| !r.is_valid())
            .map(|r| (r.row_number, r.validation_errors.clone()))
            .collect()
    }
}

/// Parse and validate one uploaded file.
///
/// Runs the pre-parse input guards, then validates every data row exactly
/// once in source order. Validator failures never abort parsing of
/// subsequent rows.
pub fn parse_upload(
    bytes: &[u8],
    file_name: &str,
    company_code: &str,
    uploaded_by: &str,
    strict_mode: bool,
    config: &ImportConfig,
) -> UploadResult<ParseOutcome> {
    if !config.accepts_extension(file_name) {
        warn!(file_name, "upload rejected: unsupported file type");
        return Err(UploadError::UnsupportedFileType(file_name.to_string()));
    }

    if bytes.len() > config.max_file_size {
        warn!(size = bytes.len(), limit = config.max_file_size, "upload rejected: too large");
        return Err(UploadError::FileTooLarge {
            size: bytes.len(),
            limit: config.max_file_size,
        });
    }

    let profile = config
        .company(company_code)
        .ok_or_else(|| UploadError::UnknownCompany(company_code.to_string()))?;
    let company = company_code.trim().to_lowercase();

    let parsed = parser::parse_bytes(bytes)?;
    if parsed.records.is_empty() {
        return Err(UploadError::Parse(crate::error::ParseError::EmptyFile));
    }

    let batch_id = Uuid::new_v4();
    let mut rows = Vec::with_capacity(parsed.records.len());
    let mut error_rows = 0u32;

    for record in &parsed.records {
        let outcome = validate_row(record, profile);
        if !outcome.is_valid() {
            error_rows += 1;
        }
        rows.push(StagedTransaction::from_outcome(batch_id, record.row_number, outcome));
    }

    let total_rows = rows.len() as u32;
    let valid_rows = total_rows - error_rows;

    let status = if error_rows == 0 {
        BatchStatus::Staged
    } else if strict_mode {
        BatchStatus::Failed
    } else {
        BatchStatus::CompletedWithErrors
    };

    info!(
        batch_id = %batch_id,
        company = %company,
        file_name,
        total_rows,
        valid_rows,
        error_rows,
        status = %status,
        "parsed upload"
    );

    let batch = ImportBatch {
        id: batch_id,
        source_company: company,
        file_name: file_name.to_string(),
        uploaded_by: uploaded_by.to_string(),
        uploaded_at: Utc::now(),
        strict_mode,
        status,
        total_rows,
        valid_rows,
        error_rows,
        committed_at: None,
        committed_by: None,
    };

    Ok(ParseOutcome { batch, rows, encoding: parsed.encoding, delimiter: parsed.delimiter })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "transaction_number,customer_number,customer_name,product_code,product_description,quantity,sales_amount,cost_of_sales,transaction_date";

    fn csv_with_rows(rows: &[&str]) -> Vec<u8> {
        let mut content = HEADER.to_string();
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content.into_bytes()
    }

    fn valid_row(n: u32) -> String {
        format!("TX-{n},C-1,Acme,P-1,Widget,2,10.00,4.00,03/15/2024")
    }

    fn parse(bytes: &[u8], strict: bool) -> UploadResult<ParseOutcome> {
        parse_upload(bytes, "sales.csv", "us", "operator", strict, &ImportConfig::default())
    }

    #[test]
    fn test_all_valid_rows_stage() {
        let bytes = csv_with_rows(&[&valid_row(1), &valid_row(2)]);
        let outcome = parse(&bytes, false).unwrap();

        assert_eq!(outcome.batch.status, BatchStatus::Staged);
        assert_eq!(outcome.batch.total_rows, 2);
        assert_eq!(outcome.batch.valid_rows, 2);
        assert_eq!(outcome.batch.error_rows, 0);
        assert!(outcome.row_errors().is_empty());
    }

    #[test]
    fn test_lenient_mode_flags_invalid_rows() {
        let bad = "TX-9,C-1,Acme,P-1,Widget,lots,10.00,4.00,03/15/2024";
        let bytes = csv_with_rows(&[&valid_row(1), bad, &valid_row(3)]);
        let outcome = parse(&bytes, false).unwrap();

        assert_eq!(outcome.batch.status, BatchStatus::CompletedWithErrors);
        assert_eq!(outcome.batch.total_rows, 3);
        assert_eq!(outcome.batch.valid_rows, 2);
        assert_eq!(outcome.batch.error_rows, 1);

        let errors = outcome.row_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 2);
    }

    #[test]
    fn test_strict_mode_fails_whole_batch() {
        let bad = "TX-9,C-1,Acme,P-1,Widget,lots,10.00,4.00,03/15/2024";
        let bytes = csv_with_rows(&[&valid_row(1), bad]);
        let outcome = parse(&bytes, true).unwrap();

        assert_eq!(outcome.batch.status, BatchStatus::Failed);
        assert_eq!(outcome.batch.valid_rows, 1);
        assert_eq!(outcome.batch.error_rows, 1);
    }

    #[test]
    fn test_counts_invariant_holds() {
        let bad = "TX-9,,,P-1,Widget,1,1.00,1.00,03/15/2024";
        let bytes = csv_with_rows(&[&valid_row(1), bad, &valid_row(3)]);
        let outcome = parse(&bytes, false).unwrap();

        let b = &outcome.batch;
        assert_eq!(b.valid_rows + b.error_rows, b.total_rows);
    }

    #[test]
    fn test_row_numbers_sequential_from_one() {
        let bytes = csv_with_rows(&[&valid_row(1), &valid_row(2), &valid_row(3)]);
        let outcome = parse(&bytes, false).unwrap();

        let numbers: Vec<u32> = outcome.rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_unsupported_file_type() {
        let bytes = csv_with_rows(&[&valid_row(1)]);
        let err = parse_upload(&bytes, "sales.xlsx", "us", "op", false, &ImportConfig::default())
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_oversize_file() {
        let config = ImportConfig { max_file_size: 10, ..ImportConfig::default() };
        let bytes = csv_with_rows(&[&valid_row(1)]);
        let err =
            parse_upload(&bytes, "sales.csv", "us", "op", false, &config).unwrap_err();
        assert!(matches!(err, UploadError::FileTooLarge { .. }));
    }

    #[test]
    fn test_unknown_company() {
        let bytes = csv_with_rows(&[&valid_row(1)]);
        let err = parse_upload(&bytes, "sales.csv", "zz", "op", false, &ImportConfig::default())
            .unwrap_err();
        assert!(matches!(err, UploadError::UnknownCompany(_)));
    }

    #[test]
    fn test_empty_upload_rejected() {
        let err = parse(HEADER.as_bytes(), false).unwrap_err();
        assert!(matches!(err, UploadError::Parse(crate::error::ParseError::EmptyFile)));
    }

    #[test]
    fn test_five_row_example() {
        // Row 3 has a non-numeric quantity; lenient upload flags exactly it.
        let bad = "TX-3,C-1,Acme,P-1,Widget,three,10.00,4.00,03/15/2024";
        let bytes = csv_with_rows(&[
            &valid_row(1),
            &valid_row(2),
            bad,
            &valid_row(4),
            &valid_row(5),
        ]);
        let outcome = parse(&bytes, false).unwrap();

        assert_eq!(outcome.batch.total_rows, 5);
        assert_eq!(outcome.batch.valid_rows, 4);
        assert_eq!(outcome.batch.error_rows, 1);
        assert_eq!(outcome.batch.status, BatchStatus::CompletedWithErrors);
        assert_eq!(outcome.row_errors()[0].0, 3);
    }
}
