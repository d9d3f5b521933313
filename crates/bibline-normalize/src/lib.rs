//! Bibline Normalize - nested bibliographic work records to relational tables
//!
//! This crate decomposes raw "work" records from a scholarly graph API
//! (OpenAlex) or a citation database search API (Scopus) into nine
//! key-deduplicated tables: publications, authors, institutions, funders and
//! five junction tables.
//!
//! # Example
//!
//! ```
//! use bibline_normalize::{SourceKind, decompose};
//! use serde_json::json;
//!
//! let batch = vec![
//!     json!({"doi": "https://doi.org/10.1/ABC", "title": "First"}),
//!     json!({"title": "no DOI, skipped"}),
//!     json!({"doi": "10.1/abc", "title": "Revised"}),
//! ];
//! let out = decompose(&batch, SourceKind::OpenAlex.source());
//! let pubs = out.tables.publications();
//! assert_eq!(pubs.len(), 1);
//! assert_eq!(pubs[0].title(), Some("Revised"));
//! assert_eq!(out.report.records_skipped(), 1);
//! ```

pub mod config;
pub mod decompose;
pub mod doi;
pub mod error;
pub mod extract;
pub mod flatten;
pub mod input;
pub mod output;
pub mod registry;
pub mod report;
pub mod runner;
pub mod schema;
pub mod source;
pub mod tables;

// Re-exports for convenience
pub use config::Config;
pub use decompose::{Decomposer, Decomposition, decompose, decompose_parallel};
pub use error::{BatchError, RecordSkip, Substructure};
pub use extract::{FieldSpec, FlatAttributes, Scalar};
pub use report::DecomposeReport;
pub use runner::{RunSummary, run};
pub use schema::Table;
pub use source::{SourceKind, WorkSource};
pub use tables::TableSet;
