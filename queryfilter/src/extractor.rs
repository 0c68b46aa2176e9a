//! Dialect dispatch for single-query extraction.

use crate::error::{ExtractError, ExtractResult};
use crate::models::FilterResult;
use crate::promql::PromQLFilterExtractor;
use crate::sql::ClickHouseFilterExtractor;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The query dialects an extractor can analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractorKind {
    /// ClickHouse SQL.
    #[serde(rename = "clickhouse_sql")]
    ClickHouse,
    /// PromQL.
    #[serde(rename = "promql")]
    PromQL,
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClickHouse => write!(f, "clickhouse_sql"),
            Self::PromQL => write!(f, "promql"),
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse_sql" | "clickhouse" | "sql" => Ok(Self::ClickHouse),
            "promql" => Ok(Self::PromQL),
            other => Err(ExtractError::Unsupported(format!(
                "unsupported query dialect '{other}'"
            ))),
        }
    }
}

/// Extracts metric names and grouping columns from query text.
pub trait Extractor: Send + Sync {
    /// The dialect this extractor understands.
    fn kind(&self) -> ExtractorKind;

    /// Analyzes `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be parsed or is rejected by the
    /// dialect's analyzer.
    fn extract(&self, query: &str) -> ExtractResult<FilterResult>;
}

/// Creates a default-configured extractor for `kind`.
#[must_use]
pub fn new_extractor(kind: ExtractorKind) -> Box<dyn Extractor> {
    match kind {
        ExtractorKind::ClickHouse => Box::new(ClickHouseFilterExtractor::new()),
        ExtractorKind::PromQL => Box::new(PromQLFilterExtractor::new()),
    }
}

/// Analyzes `query` in the given dialect with default configuration.
///
/// # Errors
///
/// Returns the dialect extractor's error.
///
/// # Examples
///
/// ```
/// use queryfilter::{extract, ExtractorKind};
///
/// let result = extract(ExtractorKind::PromQL, "sum by (job) (up)").unwrap();
/// assert_eq!(result.metric_names, vec!["up"]);
/// ```
pub fn extract(kind: ExtractorKind, query: &str) -> ExtractResult<FilterResult> {
    new_extractor(kind).extract(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "clickhouse_sql".parse::<ExtractorKind>().unwrap(),
            ExtractorKind::ClickHouse
        );
        assert_eq!("PromQL".parse::<ExtractorKind>().unwrap(), ExtractorKind::PromQL);
        let err = "influxql".parse::<ExtractorKind>().unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn test_kind_display_round_trips() {
        for kind in [ExtractorKind::ClickHouse, ExtractorKind::PromQL] {
            assert_eq!(kind.to_string().parse::<ExtractorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_dispatch_by_kind() {
        assert_eq!(new_extractor(ExtractorKind::PromQL).kind(), ExtractorKind::PromQL);
        let result = extract(
            ExtractorKind::ClickHouse,
            "SELECT * FROM metrics WHERE metric_name = 'cpu'",
        )
        .unwrap();
        assert_eq!(result.metric_names, vec!["cpu"]);
    }
}
