//! # Salestage - staged import, review and commit for sales transactions
//!
//! Salestage brings spreadsheet-sourced sales transactions into a system of
//! record without risking partial or corrupt writes: uploads are parsed and
//! validated row by row, held in an inspectable staging area, and promoted
//! to the production table only by an explicit, exactly-once commit.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌────────────┐
//! │ CSV bytes │──▶│  Parser +  │──▶│  Staging  │──▶│   Commit   │
//! │ (upload)  │   │ Validation │   │   Store   │   │   Engine   │
//! └───────────┘   └────────────┘   └─────┬─────┘   └────────────┘
//!                                        │ review
//!                                  ┌─────▼─────┐
//!                                  │  Queries  │
//!                                  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salestage::{parse_upload, CommitEngine, ImportConfig, StagingStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ImportConfig::default();
//!     let store = StagingStore::open("sqlite://salestage.db").await?;
//!
//!     let bytes = std::fs::read("sales.csv")?;
//!     let outcome = parse_upload(&bytes, "sales.csv", "us", "operator", false, &config)?;
//!     store.persist(&outcome).await?;
//!
//!     let receipt = CommitEngine::new(&store).commit(outcome.batch.id, "reviewer").await?;
//!     println!("committed {} rows", receipt.committed_rows);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Upload limits and the company registry
//! - [`models`] - Domain models (batches, staged rows, statuses)
//! - [`parser`] - CSV parsing with encoding/delimiter auto-detection
//! - [`validation`] - Pure per-row validation
//! - [`batch`] - Upload parsing into a countable batch
//! - [`staging`] - SQLite staging store
//! - [`commit`] - Commit/cancel state machine
//! - [`query`] - Review pagination and summaries
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing and validation
pub mod parser;
pub mod validation;

// Batch assembly
pub mod batch;

// Persistence
pub mod staging;

// State transitions
pub mod commit;

// Review
pub mod query;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CommitError, ConfigError, ParseError, QueryError, StoreError, UploadError};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{CompanyProfile, ImportConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BatchStatus,
    BatchSummary,
    ImportBatch,
    InvalidRow,
    NormalizedRow,
    PagedResult,
    RowOutcome,
    StagedTransaction,
};

// =============================================================================
// Re-exports - Parsing and validation
// =============================================================================

pub use parser::{detect_delimiter, detect_encoding, parse_bytes, ParsedFile, RawRecord};
pub use validation::validate_row;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use batch::{parse_upload, ParseOutcome};
pub use commit::{CommitEngine, CommitReceipt};
pub use query::BatchQueries;
pub use staging::StagingStore;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CommitResponse, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
