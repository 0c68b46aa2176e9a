//! Filter extraction for PromQL.
//!
//! Metric names come from every vector and matrix selector in the tree.
//! Grouping comes from the outermost aggregation only: function calls,
//! parentheses, unary operators and subqueries are transparent, while an
//! aggregation hides every aggregation below it.

use crate::config::ExtractorConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::{Extractor, ExtractorKind};
use crate::models::{ColumnInfo, FilterResult};
use indexmap::IndexSet;
use promql_parser::label::MatchOp;
use promql_parser::parser::{self, AggregateExpr, Expr, LabelModifier, VectorSelector};
use tracing::debug;

/// Extracts metric names and grouping labels from PromQL.
///
/// # Example
///
/// ```
/// use queryfilter::promql::PromQLFilterExtractor;
///
/// let result = PromQLFilterExtractor::new()
///     .extract("sum by (pod) (rate(http_requests_total[5m]))")
///     .unwrap();
/// assert_eq!(result.metric_names, vec!["http_requests_total"]);
/// assert_eq!(result.group_by_columns[0].name, "pod");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromQLFilterExtractor {
    config: ExtractorConfig,
}

impl PromQLFilterExtractor {
    /// Creates an extractor matching metric names on `__name__`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with the given configuration.
    #[must_use]
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Analyzes a PromQL expression.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The expression does not parse (`ExtractError::Parse`)
    /// - A selector names two different metrics (`ExtractError::Ambiguous`)
    pub fn extract(&self, query: &str) -> ExtractResult<FilterResult> {
        let expr = parser::parse(query).map_err(|message| ExtractError::Parse {
            dialect: ExtractorKind::PromQL,
            message,
            query: query.to_string(),
            span: None,
        })?;

        let mut walk = Walk {
            label: &self.config.metric_name_label,
            metrics: IndexSet::new(),
            grouping: None,
        };
        walk.visit(&expr, 0)?;

        let result = FilterResult::new(
            walk.metrics.into_iter().collect(),
            walk.grouping.unwrap_or_default(),
        );
        debug!(
            dialect = %ExtractorKind::PromQL,
            metrics = result.metric_names.len(),
            group_by = result.group_by_columns.len(),
            "Extracted filters from PromQL query"
        );
        Ok(result)
    }
}

impl Extractor for PromQLFilterExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::PromQL
    }

    fn extract(&self, query: &str) -> ExtractResult<FilterResult> {
        PromQLFilterExtractor::extract(self, query)
    }
}

struct Walk<'c> {
    label: &'c str,
    metrics: IndexSet<String>,
    /// Set once the outermost aggregation has been seen.
    grouping: Option<Vec<ColumnInfo>>,
}

impl Walk<'_> {
    fn visit(&mut self, expr: &Expr, depth: usize) -> ExtractResult<()> {
        match expr {
            Expr::VectorSelector(vs) => self.selector(vs),
            Expr::MatrixSelector(ms) => self.selector(&ms.vs),
            Expr::Aggregate(agg) => self.aggregate(agg, depth),
            Expr::Call(call) => {
                for arg in &call.args.args {
                    self.visit(arg, depth)?;
                }
                Ok(())
            }
            Expr::Binary(binary) => {
                self.visit(&binary.lhs, depth)?;
                self.visit(&binary.rhs, depth)
            }
            Expr::Paren(paren) => self.visit(&paren.expr, depth),
            Expr::Unary(unary) => self.visit(&unary.expr, depth),
            Expr::Subquery(subquery) => self.visit(&subquery.expr, depth),
            Expr::NumberLiteral(_) | Expr::StringLiteral(_) | Expr::Extension(_) => Ok(()),
        }
    }

    fn aggregate(&mut self, agg: &AggregateExpr, depth: usize) -> ExtractResult<()> {
        if depth == 0 && self.grouping.is_none() {
            let mut columns: Vec<ColumnInfo> = Vec::new();
            if let Some(LabelModifier::Include(labels)) = &agg.modifier {
                for label in &labels.labels {
                    if !columns.iter().any(|c| &c.name == label) {
                        columns.push(ColumnInfo::label(label.clone()));
                    }
                }
            }
            self.grouping = Some(columns);
        }

        self.visit(&agg.expr, depth + 1)?;
        if let Some(param) = &agg.param {
            self.visit(param, depth + 1)?;
        }
        Ok(())
    }

    /// Records the selector's metric, from its name or an equality matcher
    /// on the metric label.
    fn selector(&mut self, vs: &VectorSelector) -> ExtractResult<()> {
        let mut name = vs.name.clone().filter(|n| !n.is_empty());
        for matcher in &vs.matchers.matchers {
            if matcher.name != self.label || !matches!(matcher.op, MatchOp::Equal) {
                continue;
            }
            match &name {
                Some(existing) if *existing != matcher.value => {
                    return Err(ExtractError::Ambiguous(format!(
                        "metric name asserted as both '{existing}' and '{}'",
                        matcher.value
                    )));
                }
                Some(_) => {}
                None => name = Some(matcher.value.clone()),
            }
        }
        if let Some(name) = name {
            self.metrics.insert(name);
        }
        Ok(())
    }
}
