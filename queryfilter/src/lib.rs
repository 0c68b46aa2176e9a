//! Query Filter Extraction
//!
//! This crate analyzes ClickHouse SQL and PromQL query text and reports
//! which metrics a query filters on and which columns or labels it groups
//! by, with enough provenance to trace every grouping key back to its
//! source column.
//!
//! # Modules
//!
//! - [`filter`] - Positive-literal extraction from boolean filter trees
//! - [`sql`] - ClickHouse SQL parser and analyzer
//! - [`promql`] - PromQL analyzer
//! - [`composite`] - Resolution across named multi-query requests
//! - [`models`] - Result and envelope data models
//!
//! # Example
//!
//! ```
//! use queryfilter::{extract, ExtractorKind};
//!
//! let result = extract(
//!     ExtractorKind::ClickHouse,
//!     "SELECT region AS r, avg(value) FROM metrics WHERE metric_name = 'cpu' GROUP BY region",
//! )
//! .unwrap();
//!
//! assert_eq!(result.metric_names, vec!["cpu"]);
//! assert_eq!(result.group_by_columns[0].alias, "r");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod composite;
pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod models;
pub mod promql;
pub mod sql;

pub use composite::CompositeResolver;
pub use config::ExtractorConfig;
pub use error::{ExtractError, ExtractResult, Span};
pub use extractor::{extract, new_extractor, Extractor, ExtractorKind};
pub use models::{ColumnInfo, FilterResult, QueryEnvelope};

/// Re-export common dependencies for convenience.
pub use serde_json;
pub use validator;
