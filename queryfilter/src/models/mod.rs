//! Data models shared by the extractors and the composite resolver.

pub mod envelope;
pub mod filter_result;

pub use envelope::{Aggregation, GroupByKey, QueryEnvelope, QueryType, Signal};
pub use filter_result::{ColumnInfo, FilterResult};
