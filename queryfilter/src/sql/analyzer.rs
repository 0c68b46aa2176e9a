//! Filter extraction for ClickHouse SQL.
//!
//! The analyzer walks the first SELECT of a query and reports:
//! - every metric name positively asserted on the metric column, in the
//!   statement itself and in every scope it reads from
//! - the columns of the single authoritative GROUP BY, traced back through
//!   derived tables and CTEs to the expression that produces them

use super::ast::{
    Expr, JoinConstraint, SelectStatement, SetOperator, Statement, TableFactor, UnaryOperator,
};
use super::functions::{
    is_aggregate, is_conditional, is_conditional_aggregate, is_json_extract, is_time_function,
};
use super::parser::{is_reserved_keyword, parse_statement, ParseError};
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::{Extractor, ExtractorKind};
use crate::filter::extract_positive_literals;
use crate::models::{ColumnInfo, FilterResult};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Extracts metric names and grouping columns from ClickHouse SQL.
///
/// # Example
///
/// ```
/// use queryfilter::sql::ClickHouseFilterExtractor;
///
/// let extractor = ClickHouseFilterExtractor::new();
/// let result = extractor
///     .extract("SELECT avg(value) FROM metrics WHERE metric_name = 'cpu' GROUP BY region")
///     .unwrap();
/// assert_eq!(result.metric_names, vec!["cpu"]);
/// assert_eq!(result.group_by_columns[0].origin_field, "region");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClickHouseFilterExtractor {
    config: ExtractorConfig,
}

impl ClickHouseFilterExtractor {
    /// Creates an extractor targeting the default `metric_name` column.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with the given configuration.
    #[must_use]
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the extractor configuration.
    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Analyzes the first statement of `query`.
    ///
    /// A first statement that is not a SELECT yields an empty result, and
    /// anything after the first statement is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The query is not valid SQL (`ExtractError::Parse`)
    /// - A reserved keyword is used as a bare column (`ExtractError::Unsupported`)
    pub fn extract(&self, query: &str) -> ExtractResult<FilterResult> {
        let statement = parse_statement(query).map_err(|err| parse_error(&err, query))?;
        let select = match statement {
            Statement::Select(select) => select,
            Statement::Other(keyword) => {
                debug!(
                    dialect = %ExtractorKind::ClickHouse,
                    keyword = %keyword,
                    "First statement is not a SELECT, nothing to extract"
                );
                return Ok(FilterResult::default());
            }
        };

        check_reserved(&select)?;

        let analysis = Analysis::new(&select, &self.config.metric_name_column);
        let metric_names = analysis.metric_names(&select);
        let group_by_columns = analysis.group_by_columns(&select);

        debug!(
            dialect = %ExtractorKind::ClickHouse,
            ctes = analysis.ctes.len(),
            metrics = metric_names.len(),
            group_by = group_by_columns.len(),
            "Extracted filters from SQL query"
        );

        Ok(FilterResult::new(metric_names, group_by_columns))
    }
}

impl Extractor for ClickHouseFilterExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::ClickHouse
    }

    fn extract(&self, query: &str) -> ExtractResult<FilterResult> {
        ClickHouseFilterExtractor::extract(self, query)
    }
}

fn parse_error(err: &ParseError, query: &str) -> ExtractError {
    ExtractError::Parse {
        dialect: ExtractorKind::ClickHouse,
        message: err.to_string(),
        query: query.to_string(),
        span: err.span(),
    }
}

/// Rejects bare reserved keywords where a column is expected.
fn check_reserved(select: &SelectStatement) -> ExtractResult<()> {
    let columns = select
        .projection
        .iter()
        .map(|item| &item.expr)
        .chain(select.group_by.iter().flat_map(|g| g.items.iter()));
    for expr in columns {
        if let Expr::Identifier(ident) = expr {
            if !ident.is_quoted() && is_reserved_keyword(&ident.value) {
                return Err(ExtractError::Unsupported(format!(
                    "reserved keyword '{}' used as a column",
                    ident.value
                )));
            }
        }
    }

    for (_, cte) in select.ctes() {
        check_reserved(cte)?;
    }
    if let Some(from) = &select.from {
        for relation in from.relations() {
            if let TableFactor::Derived { subquery, .. } = relation {
                check_reserved(subquery)?;
            }
        }
    }
    for branch in &select.set_branches {
        check_reserved(&branch.select)?;
    }
    Ok(())
}

// ============================================================================
// Scope analysis
// ============================================================================

/// Per-query state: the metric column and every CTE in definition order.
struct Analysis<'a> {
    field: &'a str,
    ctes: IndexMap<&'a str, &'a SelectStatement>,
}

impl<'a> Analysis<'a> {
    fn new(root: &'a SelectStatement, field: &'a str) -> Self {
        let mut ctes = IndexMap::new();
        collect_ctes(root, &mut ctes);
        Self { field, ctes }
    }

    fn metric_names(&self, root: &'a SelectStatement) -> Vec<String> {
        let mut scanned = HashSet::new();
        let mut found = IndexSet::new();
        self.collect_metrics(root, &mut scanned, &mut found);
        found.into_iter().collect()
    }

    fn collect_metrics(
        &self,
        select: &'a SelectStatement,
        scanned: &mut HashSet<&'a str>,
        found: &mut IndexSet<String>,
    ) {
        let conditions = conditions(select);
        for condition in &conditions {
            found.extend(extract_positive_literals(condition, self.field));
        }
        for item in &select.projection {
            self.scan_projection(&item.expr, found);
        }

        let mut nested = Vec::new();
        for expr in conditions
            .iter()
            .copied()
            .chain(select.projection.iter().map(|item| &item.expr))
        {
            nested_queries(expr, &mut nested);
        }
        for node in nested {
            match node {
                Expr::Exists(query) | Expr::Subquery(query) => {
                    self.collect_metrics(query, scanned, found);
                }
                Expr::InSubquery { expr, subquery, .. }
                    if expr.column_name() == Some(self.field) =>
                {
                    self.collect_metrics(subquery, scanned, found);
                }
                _ => {}
            }
        }

        if let Some(from) = &select.from {
            for relation in from.relations() {
                if let TableFactor::Derived { subquery, .. } = relation {
                    self.collect_metrics(subquery, scanned, found);
                } else if let Some((name, cte)) = relation
                    .cte_candidate()
                    .and_then(|name| self.ctes.get_key_value(name))
                {
                    if scanned.insert(*name) {
                        self.collect_metrics(*cte, scanned, found);
                    }
                }
            }
        }

        for branch in &select.set_branches {
            if branch.op != SetOperator::Except {
                self.collect_metrics(&branch.select, scanned, found);
            }
        }
    }

    /// Finds filters hidden in projection expressions such as
    /// `sumIf(value, metric_name = 'cpu')` and `CASE WHEN ...`.
    fn scan_projection(&self, expr: &Expr, found: &mut IndexSet<String>) {
        match expr {
            Expr::Function(func) if is_conditional_aggregate(&func.name) => {
                found.extend(extract_positive_literals(expr, self.field));
            }
            Expr::Case { operand: None, .. } => {
                found.extend(extract_positive_literals(expr, self.field));
            }
            _ => {}
        }
        for child in expr.children() {
            self.scan_projection(child, found);
        }
    }

    /// Returns the scopes `select` reads from, in FROM order, paired with
    /// the CTE name when the scope is a CTE reference.
    fn inner_scopes(
        &self,
        select: &'a SelectStatement,
        path: &[&'a str],
    ) -> Vec<(Option<&'a str>, &'a SelectStatement)> {
        let mut scopes = Vec::new();
        let Some(from) = &select.from else {
            return scopes;
        };
        for relation in from.relations() {
            if let TableFactor::Derived { subquery, .. } = relation {
                scopes.push((None, subquery.as_ref()));
                continue;
            }
            let Some((name, cte)) = relation
                .cte_candidate()
                .and_then(|name| self.ctes.get_key_value(name))
            else {
                continue;
            };
            if path.contains(name) {
                warn!(cte = %name, "Cyclic CTE reference left unresolved");
            } else {
                scopes.push((Some(*name), *cte));
            }
        }
        scopes
    }

    // ------------------------------------------------------------------------
    // Grouping
    // ------------------------------------------------------------------------

    fn group_by_columns(&self, root: &'a SelectStatement) -> Vec<ColumnInfo> {
        let mut path = Vec::new();
        let owner = self.find_grouping(root, &mut path).or_else(|| {
            self.ctes
                .iter()
                .rev()
                .find(|(_, cte)| cte.group_by.is_some())
                .map(|(name, cte)| (*cte, vec![*name]))
        });
        let Some((owner, mut path)) = owner else {
            return Vec::new();
        };
        let Some(group_by) = &owner.group_by else {
            return Vec::new();
        };

        let mut columns: Vec<ColumnInfo> = Vec::new();
        for item in &group_by.items {
            let name = stripped_name(item);
            if columns.iter().any(|c| c.name == name) {
                continue;
            }

            let alias = owner
                .projection
                .iter()
                .rev()
                .find(|entry| stripped_name(&entry.expr) == name)
                .and_then(|entry| entry.alias.as_ref())
                .map(|alias| alias.value.clone())
                .unwrap_or_default();

            let origin = self
                .resolve_origin(&name, owner, &mut path)
                .unwrap_or_else(|| {
                    if is_simple_column(item) {
                        Expr::column(name.clone())
                    } else {
                        item.clone()
                    }
                });

            trace!(column = %name, origin = %origin, "Resolved grouping column");
            let field = origin_field(&origin);
            columns.push(ColumnInfo::new(name, alias, origin.to_string(), field));
        }
        columns
    }

    /// Finds the select owning the authoritative GROUP BY: `select` itself,
    /// else the nearest scope along its FROM chain.
    fn find_grouping(
        &self,
        select: &'a SelectStatement,
        path: &mut Vec<&'a str>,
    ) -> Option<(&'a SelectStatement, Vec<&'a str>)> {
        if select.group_by.is_some() {
            return Some((select, path.clone()));
        }
        for (name, scope) in self.inner_scopes(select, path) {
            if let Some(name) = name {
                path.push(name);
            }
            let found = self.find_grouping(scope, path);
            if name.is_some() {
                path.pop();
            }
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Traces `column` to the expression that defines it. Inner scopes win
    /// over the projection of `select` when they rename or compute it.
    fn resolve_origin(
        &self,
        column: &str,
        select: &'a SelectStatement,
        path: &mut Vec<&'a str>,
    ) -> Option<Expr> {
        for (name, scope) in self.inner_scopes(select, path) {
            if let Some(name) = name {
                path.push(name);
            }
            let resolved = self.resolve_origin(column, scope, path);
            if name.is_some() {
                path.pop();
            }
            if let Some(expr) = resolved {
                if expr.to_string() != column {
                    trace!(column, origin = %expr, "Column defined in inner scope");
                    return Some(expr);
                }
            }
        }

        let entry = select.projection.iter().rev().find(|entry| {
            entry.alias.as_ref().is_some_and(|a| a.value == column)
                || stripped_name(&entry.expr) == column
        })?;

        if is_simple_column(&entry.expr) {
            let source = stripped_name(&entry.expr);
            let traced = self.trace_inner(&source, select, path);
            Some(traced.unwrap_or_else(|| Expr::column(source)))
        } else {
            Some(entry.expr.clone())
        }
    }

    fn trace_inner(
        &self,
        column: &str,
        select: &'a SelectStatement,
        path: &mut Vec<&'a str>,
    ) -> Option<Expr> {
        for (name, scope) in self.inner_scopes(select, path) {
            if let Some(name) = name {
                path.push(name);
            }
            let resolved = self.resolve_origin(column, scope, path);
            if name.is_some() {
                path.pop();
            }
            if resolved.is_some() {
                return resolved;
            }
        }
        None
    }
}

/// Registers every CTE reachable from `select`, outer definitions first.
/// The first definition of a name wins.
fn collect_ctes<'a>(select: &'a SelectStatement, out: &mut IndexMap<&'a str, &'a SelectStatement>) {
    for (name, query) in select.ctes() {
        out.entry(name.value.as_str()).or_insert(query);
        collect_ctes(query, out);
    }
    if let Some(from) = &select.from {
        for relation in from.relations() {
            if let TableFactor::Derived { subquery, .. } = relation {
                collect_ctes(subquery, out);
            }
        }
    }
    for branch in &select.set_branches {
        collect_ctes(&branch.select, out);
    }

    let mut nested = Vec::new();
    for expr in conditions(select)
        .into_iter()
        .chain(select.projection.iter().map(|item| &item.expr))
    {
        nested_queries(expr, &mut nested);
    }
    for node in nested {
        match node {
            Expr::Exists(query) | Expr::Subquery(query) => collect_ctes(query, out),
            Expr::InSubquery { subquery, .. } => collect_ctes(subquery, out),
            _ => {}
        }
    }
}

/// Boolean trees of a select: PREWHERE, WHERE, HAVING and JOIN ON.
fn conditions(select: &SelectStatement) -> Vec<&Expr> {
    let mut out: Vec<&Expr> = select
        .prewhere
        .iter()
        .chain(select.selection.iter())
        .chain(select.having.iter())
        .collect();
    if let Some(from) = &select.from {
        for join in &from.joins {
            if let JoinConstraint::On(expr) = &join.constraint {
                out.push(expr);
            }
        }
    }
    out
}

/// Collects the sub-query nodes (`EXISTS`, scalar, `IN (SELECT ...)`)
/// inside `expr` without entering the sub-queries themselves.
///
/// Sub-queries under `NOT` and `NOT IN (SELECT ...)` only ever exclude
/// rows and are skipped.
fn nested_queries<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => return,
        Expr::Exists(_) | Expr::Subquery(_) | Expr::InSubquery { negated: false, .. } => {
            out.push(expr);
        }
        _ => {}
    }
    for child in expr.children() {
        nested_queries(child, out);
    }
}

// ============================================================================
// Column provenance
// ============================================================================

/// The display name of a grouping item: qualifier and quotes removed for
/// columns, canonical text for anything else.
fn stripped_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|part| part.value.clone())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Plain references that can be traced further. Quoted identifiers are
/// terminal.
fn is_simple_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(ident) => !ident.is_quoted(),
        Expr::CompoundIdentifier(_) => true,
        _ => false,
    }
}

fn origin_field(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|part| part.value.clone())
            .unwrap_or_default(),
        Expr::Nested(inner) => origin_field(inner),
        Expr::Function(func) if is_json_extract(&func.name) => func
            .args
            .get(1)
            .filter(|key| !contains_json_extract(key))
            .and_then(Expr::as_string_literal)
            .map(str::to_string)
            .unwrap_or_default(),
        other if transforms_values(other) => String::new(),
        other => {
            let mut bound = Vec::new();
            let mut columns = IndexSet::new();
            collect_columns(other, &mut bound, &mut columns);
            if columns.len() == 1 {
                columns
                    .first()
                    .map(|column| (*column).to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            }
        }
    }
}

fn contains_json_extract(expr: &Expr) -> bool {
    match expr {
        Expr::Function(func) if is_json_extract(&func.name) => true,
        other => other.children().into_iter().any(contains_json_extract),
    }
}

/// True when the expression buckets time, aggregates or branches anywhere,
/// so its values are not those of a single source column.
fn transforms_values(expr: &Expr) -> bool {
    match expr {
        Expr::Function(func)
            if is_time_function(&func.name)
                || is_aggregate(&func.name)
                || is_conditional(&func.name) =>
        {
            true
        }
        Expr::Case { .. } | Expr::Interval { .. } => true,
        other => other.children().into_iter().any(transforms_values),
    }
}

/// Collects distinct column references, skipping lambda parameters.
fn collect_columns<'e>(expr: &'e Expr, bound: &mut Vec<&'e str>, out: &mut IndexSet<&'e str>) {
    match expr {
        Expr::Identifier(ident) => {
            if !bound.contains(&ident.value.as_str()) {
                out.insert(ident.value.as_str());
            }
        }
        Expr::CompoundIdentifier(parts) => {
            if let Some(last) = parts.last() {
                out.insert(last.value.as_str());
            }
        }
        Expr::Lambda { params, body } => {
            let depth = bound.len();
            bound.extend(params.iter().map(|param| param.value.as_str()));
            collect_columns(body, bound, out);
            bound.truncate(depth);
        }
        other => {
            for child in other.children() {
                collect_columns(child, bound, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse_select;

    fn extract(query: &str) -> FilterResult {
        ClickHouseFilterExtractor::new().extract(query).unwrap()
    }

    fn origin_field_of(expr_sql: &str) -> String {
        let select = parse_select(&format!("SELECT {expr_sql} FROM t")).unwrap();
        origin_field(&select.projection[0].expr)
    }

    #[test]
    fn test_simple_group_by() {
        let result = extract("SELECT avg(value) FROM metrics WHERE metric_name='cpu' GROUP BY region");
        assert_eq!(result.metric_names, vec!["cpu"]);
        assert_eq!(
            result.group_by_columns,
            vec![ColumnInfo::new("region", "", "region", "region")]
        );
    }

    #[test]
    fn test_non_select_statement_is_empty() {
        let result = extract("DELETE FROM metrics WHERE metric_name = 'cpu'");
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_error_carries_span_and_query() {
        let err = ClickHouseFilterExtractor::new()
            .extract("SELECT FROM metrics WHERE")
            .unwrap_err();
        match err {
            ExtractError::Parse {
                dialect,
                query,
                span,
                ..
            } => {
                assert_eq!(dialect, ExtractorKind::ClickHouse);
                assert_eq!(query, "SELECT FROM metrics WHERE");
                assert!(span.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reserved_keyword_column_is_unsupported() {
        let err = ClickHouseFilterExtractor::new()
            .extract("SELECT count() FROM metrics GROUP BY region, from")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn test_configured_metric_column() {
        let extractor = ClickHouseFilterExtractor::with_config(
            ExtractorConfig::default().with_metric_name_column("name"),
        );
        let result = extractor
            .extract("SELECT * FROM metrics WHERE name = 'cpu' AND metric_name = 'mem'")
            .unwrap();
        assert_eq!(result.metric_names, vec!["cpu"]);
    }

    #[test]
    fn test_unrelated_in_subquery_not_scanned() {
        let result = extract(
            "SELECT * FROM metrics WHERE region IN (SELECT region FROM r WHERE metric_name = 'x')",
        );
        assert!(result.metric_names.is_empty());
    }

    #[test]
    fn test_metric_in_subquery_scanned() {
        let result = extract(
            "SELECT * FROM metrics WHERE metric_name IN (SELECT metric_name FROM m WHERE metric_name = 'cpu')",
        );
        assert_eq!(result.metric_names, vec!["cpu"]);
    }

    #[test]
    fn test_not_exists_subquery_not_scanned() {
        let result = extract(
            "SELECT * FROM metrics WHERE metric_name='cpu' AND NOT EXISTS (SELECT 1 FROM m WHERE metric_name='excluded')",
        );
        assert_eq!(result.metric_names, vec!["cpu"]);
    }

    #[test]
    fn test_not_in_subquery_not_scanned() {
        let result = extract(
            "SELECT * FROM metrics WHERE metric_name='cpu' AND metric_name NOT IN (SELECT x FROM t WHERE metric_name='bad')",
        );
        assert_eq!(result.metric_names, vec!["cpu"]);
    }

    #[test]
    fn test_escaped_metric_literals_decoded() {
        let result = extract(
            r"SELECT * FROM metrics WHERE metric_name = 'O''Brien' OR metric_name = 'it\'s'",
        );
        assert_eq!(result.metric_names, vec!["O'Brien", "it's"]);
    }

    #[test]
    fn test_unreferenced_cte_not_scanned() {
        let result = extract(
            "WITH a AS (SELECT * FROM metrics WHERE metric_name = 'cpu') SELECT * FROM metrics",
        );
        assert!(result.metric_names.is_empty());
    }

    #[test]
    fn test_cyclic_cte_terminates() {
        let result = extract(
            "WITH a AS (SELECT x FROM b WHERE metric_name = 'cpu'), b AS (SELECT x FROM a) \
             SELECT x FROM a GROUP BY x",
        );
        assert_eq!(result.metric_names, vec!["cpu"]);
        assert_eq!(
            result.group_by_columns,
            vec![ColumnInfo::new("x", "", "x", "x")]
        );
    }

    #[test]
    fn test_last_cte_group_by_fallback() {
        let result = extract(
            "WITH a AS (SELECT region FROM metrics GROUP BY region), \
             b AS (SELECT host FROM metrics GROUP BY host) \
             SELECT 1",
        );
        assert_eq!(result.group_by_columns.len(), 1);
        assert_eq!(result.group_by_columns[0].name, "host");
    }

    #[test]
    fn test_duplicate_group_items_reported_once() {
        let result = extract("SELECT 1 FROM metrics GROUP BY region, m.region");
        assert_eq!(result.group_by_columns.len(), 1);
    }

    #[test]
    fn test_origin_field_classification() {
        assert_eq!(origin_field_of("region"), "region");
        assert_eq!(origin_field_of("`os.type`"), "os.type");
        assert_eq!(origin_field_of("m.region"), "region");
        assert_eq!(origin_field_of("lower(region)"), "region");
        assert_eq!(
            origin_field_of("JSONExtractString(labels, 'service.name')"),
            "service.name"
        );
        assert_eq!(
            origin_field_of("JSONExtractString(labels, JSONExtractString(labels, 'k'))"),
            ""
        );
        assert_eq!(origin_field_of("toDate(timestamp)"), "");
        assert_eq!(origin_field_of("sum(value)"), "");
        assert_eq!(origin_field_of("if(a > 0, a, 0)"), "");
        assert_eq!(origin_field_of("CASE WHEN a > 0 THEN a END"), "");
        assert_eq!(origin_field_of("concat(a, b)"), "");
        assert_eq!(origin_field_of("arrayMap(x -> x + 1, values)"), "values");
        assert_eq!(origin_field_of("42"), "");
    }

    #[test]
    fn test_idempotent() {
        let query = "WITH t AS (SELECT region AS r FROM metrics WHERE metric_name = 'cpu' GROUP BY region) SELECT r FROM t";
        assert_eq!(extract(query), extract(query));
    }
}
