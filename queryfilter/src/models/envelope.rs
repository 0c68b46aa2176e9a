//! Query envelope model.
//!
//! A multi-query request carries one envelope per named sub-query. Builder
//! envelopes describe their query structurally; PromQL and ClickHouse
//! envelopes carry query text; formula envelopes combine other envelopes by
//! name.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// The kind of sub-query an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    /// A structured query-builder query.
    #[serde(rename = "builder_query", alias = "builder")]
    Builder,
    /// A PromQL query.
    #[serde(rename = "promql")]
    PromQL,
    /// A ClickHouse SQL query.
    #[serde(rename = "clickhouse_sql")]
    ClickHouseSql,
    /// An arithmetic formula over other envelopes.
    #[serde(rename = "builder_formula", alias = "formula")]
    Formula,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builder => write!(f, "builder_query"),
            Self::PromQL => write!(f, "promql"),
            Self::ClickHouseSql => write!(f, "clickhouse_sql"),
            Self::Formula => write!(f, "builder_formula"),
        }
    }
}

/// The telemetry signal a builder query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Metric samples.
    #[default]
    Metrics,
    /// Log records.
    Logs,
    /// Trace spans.
    Traces,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metrics => write!(f, "metrics"),
            Self::Logs => write!(f, "logs"),
            Self::Traces => write!(f, "traces"),
        }
    }
}

/// One aggregation of a builder query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    /// The aggregated metric.
    #[serde(default)]
    pub metric_name: String,
}

/// One grouping key of a builder query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByKey {
    /// The key name.
    #[serde(default)]
    pub name: String,
}

/// A named sub-query of a composite request.
///
/// # Example
///
/// ```
/// use queryfilter::models::{QueryEnvelope, QueryType};
///
/// let envelope: QueryEnvelope = serde_json::from_str(
///     r#"{"name": "A", "type": "promql", "query": "sum(rate(http_requests_total[5m]))"}"#,
/// )
/// .unwrap();
/// assert_eq!(envelope.query_type, QueryType::PromQL);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryEnvelope {
    /// The sub-query name; formulas refer to it.
    #[validate(length(min = 1, message = "Query name cannot be empty"))]
    pub name: String,

    /// The kind of sub-query.
    #[serde(rename = "type")]
    pub query_type: QueryType,

    /// Query text, for PromQL and ClickHouse envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Formula expression, for formula envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Signal read by a builder envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,

    /// Aggregations of a builder envelope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Aggregation>,

    /// Grouping keys of a builder envelope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupByKey>,
}

impl QueryEnvelope {
    fn empty(name: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            name: name.into(),
            query_type,
            query: None,
            expression: None,
            signal: None,
            aggregations: Vec::new(),
            group_by: Vec::new(),
        }
    }

    /// Creates a builder envelope over the metrics signal.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> Self {
        Self {
            signal: Some(Signal::Metrics),
            ..Self::empty(name, QueryType::Builder)
        }
    }

    /// Creates a PromQL envelope.
    #[must_use]
    pub fn promql(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::empty(name, QueryType::PromQL)
        }
    }

    /// Creates a ClickHouse SQL envelope.
    #[must_use]
    pub fn clickhouse_sql(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::empty(name, QueryType::ClickHouseSql)
        }
    }

    /// Creates a formula envelope.
    #[must_use]
    pub fn formula(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::empty(name, QueryType::Formula)
        }
    }

    /// Sets the builder signal.
    #[must_use]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Adds an aggregation over `metric_name`.
    #[must_use]
    pub fn with_aggregation(mut self, metric_name: impl Into<String>) -> Self {
        self.aggregations.push(Aggregation {
            metric_name: metric_name.into(),
        });
        self
    }

    /// Adds a grouping key.
    #[must_use]
    pub fn with_group_by(mut self, name: impl Into<String>) -> Self {
        self.group_by.push(GroupByKey { name: name.into() });
        self
    }

    /// Returns the query text, treating whitespace-only text as absent.
    #[must_use]
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_builder_envelope() {
        let envelope: QueryEnvelope = serde_json::from_str(
            r#"{
                "name": "A",
                "type": "builder_query",
                "signal": "metrics",
                "aggregations": [{"metricName": "cpu"}],
                "groupBy": [{"name": "host"}]
            }"#,
        )
        .unwrap();
        assert_eq!(
            envelope,
            QueryEnvelope::builder("A")
                .with_aggregation("cpu")
                .with_group_by("host")
        );
    }

    #[test]
    fn test_query_type_aliases() {
        let builder: QueryType = serde_json::from_str(r#""builder""#).unwrap();
        let formula: QueryType = serde_json::from_str(r#""formula""#).unwrap();
        assert_eq!(builder, QueryType::Builder);
        assert_eq!(formula, QueryType::Formula);
    }

    #[test]
    fn test_unknown_query_type_rejected() {
        let result: Result<QueryEnvelope, _> =
            serde_json::from_str(r#"{"name": "A", "type": "sql_server", "query": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_name() {
        let envelope = QueryEnvelope::promql("", "up");
        assert!(envelope.validate().is_err());
        assert!(QueryEnvelope::promql("A", "up").validate().is_ok());
    }

    #[test]
    fn test_query_text_ignores_blank() {
        assert_eq!(QueryEnvelope::promql("A", "  ").query_text(), None);
        assert_eq!(QueryEnvelope::promql("A", "up").query_text(), Some("up"));
        assert_eq!(QueryEnvelope::formula("F", "A + B").query_text(), None);
    }

    #[test]
    fn test_display_matches_wire_names() {
        assert_eq!(QueryType::ClickHouseSql.to_string(), "clickhouse_sql");
        assert_eq!(Signal::Traces.to_string(), "traces");
    }
}
