//! Extraction result model.
//!
//! Defines `FilterResult`, the answer to "which metrics does this query read
//! and how does it group them", and `ColumnInfo`, the provenance of a single
//! grouping key.

use serde::{Deserialize, Serialize};

/// A grouping key and where its values come from.
///
/// # Example
///
/// ```
/// use queryfilter::models::ColumnInfo;
///
/// let column = ColumnInfo::new(
///     "service",
///     "",
///     "JSONExtractString(labels, 'service.name')",
///     "service.name",
/// );
/// assert_eq!(column.origin_field, "service.name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// The grouping key, without table qualifier or backticks.
    pub name: String,

    /// The alias given to the key in the owning projection, or empty.
    pub alias: String,

    /// The canonical text of the expression the key was computed from.
    pub origin_expr: String,

    /// The single source column behind the key, or empty when the origin
    /// reads zero or several columns, or transforms time or aggregates.
    pub origin_field: String,
}

impl ColumnInfo {
    /// Creates a column with all provenance fields given explicitly.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        alias: impl Into<String>,
        origin_expr: impl Into<String>,
        origin_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            origin_expr: origin_expr.into(),
            origin_field: origin_field.into(),
        }
    }

    /// Creates a column that is its own origin, as for PromQL `by` labels
    /// and builder group-by keys.
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            origin_expr: name.clone(),
            origin_field: name.clone(),
            name,
        }
    }
}

/// Metric names and grouping keys extracted from a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult {
    /// Positively filtered metric names, deduplicated, in first-seen order.
    pub metric_names: Vec<String>,

    /// Columns of the single authoritative grouping clause.
    pub group_by_columns: Vec<ColumnInfo>,
}

impl FilterResult {
    /// Creates a result from its parts.
    #[must_use]
    pub fn new(metric_names: Vec<String>, group_by_columns: Vec<ColumnInfo>) -> Self {
        Self {
            metric_names,
            group_by_columns,
        }
    }

    /// Returns true when neither metrics nor grouping keys were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metric_names.is_empty() && self.group_by_columns.is_empty()
    }

    /// Merges `other` into `self`: metric names are deduplicated by value,
    /// grouping columns by name with the first occurrence kept.
    pub fn merge(&mut self, other: &FilterResult) {
        for name in &other.metric_names {
            if !self.metric_names.contains(name) {
                self.metric_names.push(name.clone());
            }
        }
        for column in &other.group_by_columns {
            if !self.group_by_columns.iter().any(|c| c.name == column.name) {
                self.group_by_columns.push(column.clone());
            }
        }
    }

    /// Returns the origin fields of the grouping columns, in order.
    #[must_use]
    pub fn origin_fields(&self) -> Vec<&str> {
        self.group_by_columns
            .iter()
            .map(|c| c.origin_field.as_str())
            .collect()
    }
}
