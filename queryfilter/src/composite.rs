//! Filter resolution across a multi-query request.
//!
//! Every envelope is resolved on its own first. Formula envelopes are
//! resolved afterwards by merging the results of the queries they reference.

use crate::config::ExtractorConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::models::{ColumnInfo, FilterResult, QueryEnvelope, QueryType, Signal};
use crate::promql::PromQLFilterExtractor;
use crate::sql::ClickHouseFilterExtractor;
use indexmap::{IndexMap, IndexSet};
use nom::branch::alt;
use nom::bytes::complete::{take_till, take_while};
use nom::character::complete::{anychar, char, digit1, multispace0, satisfy};
use nom::combinator::{map, opt, peek, recognize, value};
use nom::multi::fold_many0;
use nom::sequence::{pair, preceded};
use nom::{IResult, Parser};
use std::collections::HashSet;
use tracing::{debug, warn};
use validator::Validate;

/// Resolves one `FilterResult` per named query.
///
/// # Example
///
/// ```
/// use queryfilter::composite::CompositeResolver;
/// use queryfilter::models::QueryEnvelope;
///
/// let envelopes = vec![
///     QueryEnvelope::builder("A").with_aggregation("cpu").with_group_by("host"),
///     QueryEnvelope::promql("B", "sum by (instance) (rate(mem[5m]))"),
///     QueryEnvelope::formula("F1", "A / B"),
/// ];
/// let results = CompositeResolver::new().resolve(&envelopes).unwrap();
/// assert_eq!(results["F1"].metric_names, vec!["cpu", "mem"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompositeResolver {
    sql: ClickHouseFilterExtractor,
    promql: PromQLFilterExtractor,
}

impl CompositeResolver {
    /// Creates a resolver with default extractor configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver whose extractors share `config`.
    #[must_use]
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            sql: ClickHouseFilterExtractor::with_config(config.clone()),
            promql: PromQLFilterExtractor::with_config(config),
        }
    }

    /// Resolves every envelope, keyed by name, in input order.
    ///
    /// Builder envelopes over a signal other than metrics and text envelopes
    /// with blank query text produce no entry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An envelope fails validation (`ExtractError::Invalid`)
    /// - Two envelopes share a name (`ExtractError::Unsupported`)
    /// - A query fails to parse or is rejected by its extractor
    pub fn resolve(
        &self,
        envelopes: &[QueryEnvelope],
    ) -> ExtractResult<IndexMap<String, FilterResult>> {
        let mut names = HashSet::new();
        for envelope in envelopes {
            envelope.validate()?;
            if !names.insert(envelope.name.as_str()) {
                return Err(ExtractError::Unsupported(format!(
                    "duplicate query name '{}'",
                    envelope.name
                )));
            }
        }

        let mut resolved: IndexMap<&str, FilterResult> = IndexMap::new();
        for envelope in envelopes {
            if envelope.query_type == QueryType::Formula {
                continue;
            }
            if let Some(result) = self.resolve_query(envelope)? {
                resolved.insert(envelope.name.as_str(), result);
            }
        }

        let mut formulas: IndexMap<&str, FilterResult> = IndexMap::new();
        for envelope in envelopes {
            if envelope.query_type != QueryType::Formula {
                continue;
            }
            let expression = envelope.expression.as_deref().unwrap_or_default();
            let mut merged = FilterResult::default();
            for reference in referenced_queries(expression) {
                if let Some(result) = resolved.get(reference) {
                    merged.merge(result);
                }
            }
            debug!(
                formula = %envelope.name,
                expression,
                metrics = merged.metric_names.len(),
                "Merged formula references"
            );
            formulas.insert(envelope.name.as_str(), merged);
        }

        let mut results = IndexMap::new();
        for envelope in envelopes {
            let name = envelope.name.as_str();
            if let Some(result) = resolved
                .swap_remove(name)
                .or_else(|| formulas.swap_remove(name))
            {
                results.insert(name.to_string(), result);
            }
        }
        Ok(results)
    }

    /// Flattens a request into the metric names and grouping source fields
    /// of its non-formula queries, in input order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`CompositeResolver::resolve`].
    pub fn metric_and_group_fields(
        &self,
        envelopes: &[QueryEnvelope],
    ) -> ExtractResult<(Vec<String>, Vec<String>)> {
        let results = self.resolve(envelopes)?;
        let mut metrics = Vec::new();
        let mut fields = Vec::new();
        for envelope in envelopes {
            if envelope.query_type == QueryType::Formula {
                continue;
            }
            if let Some(result) = results.get(&envelope.name) {
                metrics.extend(result.metric_names.iter().cloned());
                fields.extend(result.origin_fields().into_iter().map(str::to_string));
            }
        }
        Ok((metrics, fields))
    }

    fn resolve_query(&self, envelope: &QueryEnvelope) -> ExtractResult<Option<FilterResult>> {
        match envelope.query_type {
            QueryType::Builder => Ok(builder_result(envelope)),
            QueryType::PromQL => envelope
                .query_text()
                .map(|query| self.promql.extract(query))
                .transpose(),
            QueryType::ClickHouseSql => envelope
                .query_text()
                .map(|query| self.sql.extract(query))
                .transpose(),
            QueryType::Formula => Ok(None),
        }
    }
}

fn builder_result(envelope: &QueryEnvelope) -> Option<FilterResult> {
    let signal = envelope.signal.unwrap_or_default();
    if signal != Signal::Metrics {
        warn!(
            query = %envelope.name,
            signal = %signal,
            "Skipping builder query over unsupported signal"
        );
        return None;
    }

    let mut result = FilterResult::default();
    for aggregation in &envelope.aggregations {
        let metric = &aggregation.metric_name;
        if !metric.is_empty() && !result.metric_names.contains(metric) {
            result.metric_names.push(metric.clone());
        }
    }
    for key in &envelope.group_by {
        if !key.name.is_empty() && !result.group_by_columns.iter().any(|c| c.name == key.name) {
            result.group_by_columns.push(ColumnInfo::label(key.name.clone()));
        }
    }
    Some(result)
}

// ============================================================================
// Formula references

#[derive(Clone)]
enum FormulaToken<'a> {
    Reference(&'a str),
    Skipped,
}

/// A quoted string; an unterminated one runs to the end of the input.
fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((char('\''), take_till(|c: char| c == '\''), opt(char('\'')))),
        recognize((char('"'), take_till(|c: char| c == '"'), opt(char('"')))),
    ))
    .parse(input)
}

/// Digits with any trailing alphanumerics or dots (`100`, `1.5e3`).
fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        digit1,
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '.'),
    ))
    .parse(input)
}

/// A name with optional dotted suffixes (`A`, `A.count`).
fn dotted_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
    ))
    .parse(input)
}

fn formula_token(input: &str) -> IResult<&str, FormulaToken<'_>> {
    alt((
        value(FormulaToken::Skipped, quoted),
        value(FormulaToken::Skipped, number),
        map(
            pair(
                dotted_identifier,
                opt(peek(preceded(multispace0, char('(')))),
            ),
            |(name, call)| match call {
                Some(_) => FormulaToken::Skipped,
                None => {
                    FormulaToken::Reference(name.split_once('.').map_or(name, |(base, _)| base))
                }
            },
        ),
        value(FormulaToken::Skipped, anychar),
    ))
    .parse(input)
}

/// Returns the distinct query names a formula references, in order.
///
/// Numbers, quoted strings and function names are skipped, and `A.count`
/// refers to `A`.
fn referenced_queries(expression: &str) -> Vec<&str> {
    let mut scan = fold_many0(formula_token, IndexSet::new, |mut names, token| {
        if let FormulaToken::Reference(name) = token {
            names.insert(name);
        }
        names
    });
    scan.parse(expression)
        .map(|(_, names)| names.into_iter().collect())
        .unwrap_or_default()
}
