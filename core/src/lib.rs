//! Consolidation and reporting core for auto-policy transaction extracts.
//!
//! DATA FLOW (one-directional, never re-entrant):
//!   1. Spreadsheet extracts land in the inbox
//!   2. Ingestion normalizes each file into a batch
//!   3. The store merges batches (keep-last dedup) and rewrites the file
//!   4. Queries reload the store, scope + filter rows, aggregate windows
//!
//! RULES:
//!   - Only `store` touches the consolidated file; writes are atomic renames.
//!   - The agent directory is loaded once per engine and read-only after.
//!   - Coercion failures become missing values; only structural failures
//!     (no store, no anchor date) surface to the caller, as a no-data result.

pub mod aggregate;
pub mod column;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod mapping;
pub mod record;
pub mod store;
pub mod types;
pub mod validate;
pub mod vocab;

pub use engine::ReportEngine;
pub use error::{PipelineError, PipelineResult};
