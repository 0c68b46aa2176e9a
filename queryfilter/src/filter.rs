//! Positive-literal extraction from boolean filter trees.
//!
//! Given a condition and a target column, the walker reports every string
//! literal the condition asserts the column may equal:
//!
//! - `field = 'a'` and `'a' = field`
//! - `field [GLOBAL] IN ('a', 'b')` and `field IN ['a', 'b']`
//! - `field = any(['a', 'b'])`
//!
//! Both sides of `AND` and `OR` are walked. Negations, patterns,
//! function-wrapped literals and sub-queries contribute nothing; sub-queries
//! are the SQL analyzer's concern.

use crate::sql::ast::{BinaryOperator, Expr, Function};
use crate::sql::functions::is_conditional_aggregate;
use indexmap::IndexSet;

/// Collects the string literals `expr` positively asserts for `field`, in
/// first-seen order.
///
/// Qualified references match on their last segment, so `m.metric_name`
/// matches the field `metric_name`. Empty literals are ignored.
///
/// # Examples
///
/// ```
/// use queryfilter::filter::extract_positive_literals;
/// use queryfilter::sql::parse_select;
///
/// let select = parse_select(
///     "SELECT * FROM metrics WHERE metric_name IN ('cpu', 'mem') AND metric_name != 'disk'",
/// )
/// .unwrap();
/// let names = extract_positive_literals(select.selection.as_ref().unwrap(), "metric_name");
/// assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["cpu", "mem"]);
/// ```
#[must_use]
pub fn extract_positive_literals(expr: &Expr, field: &str) -> IndexSet<String> {
    let mut found = IndexSet::new();
    visit(expr, field, &mut found);
    found
}

fn visit(expr: &Expr, field: &str, found: &mut IndexSet<String>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right,
        } => {
            visit(left, field, found);
            visit(right, field, found);
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            if is_field(left, field) {
                equality_value(right, found);
            } else if is_field(right, field) {
                equality_value(left, found);
            }
        }
        Expr::Nested(inner) => visit(inner, field, found),
        Expr::InList {
            expr: target,
            list,
            negated: false,
            ..
        } if is_field(target, field) => {
            for item in list {
                push_literal(item, found);
            }
        }
        Expr::InExpr {
            expr: target,
            target: values,
            negated: false,
            ..
        } if is_field(target, field) => {
            if let Expr::Array(items) = values.as_ref() {
                for item in items {
                    push_literal(item, found);
                }
            }
        }
        Expr::Function(func) if is_conditional_aggregate(&func.name) => {
            if let Some(condition) = func.args.last() {
                visit(condition, field, found);
            }
        }
        Expr::Case {
            operand: None,
            branches,
            ..
        } => {
            for branch in branches {
                visit(&branch.condition, field, found);
            }
        }
        _ => {}
    }
}

fn is_field(expr: &Expr, field: &str) -> bool {
    expr.column_name() == Some(field)
}

/// Handles the value side of `field = value`.
fn equality_value(value: &Expr, found: &mut IndexSet<String>) {
    match value {
        Expr::Function(func) => {
            if is_any_of(func) {
                for arg in &func.args {
                    if let Expr::Array(items) = arg {
                        for item in items {
                            push_literal(item, found);
                        }
                    }
                }
            }
        }
        other => push_literal(other, found),
    }
}

/// `any(['a', 'b'])` on the value side of an equality means "one of".
fn is_any_of(func: &Function) -> bool {
    func.name.eq_ignore_ascii_case("any") && func.params.is_none() && func.over.is_none()
}

fn push_literal(expr: &Expr, found: &mut IndexSet<String>) {
    if let Some(value) = expr.as_string_literal() {
        if !value.is_empty() {
            found.insert(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse_select;

    fn names(condition: &str) -> Vec<String> {
        let select = parse_select(&format!("SELECT * FROM metrics WHERE {condition}")).unwrap();
        extract_positive_literals(select.selection.as_ref().unwrap(), "metric_name")
            .into_iter()
            .collect()
    }

    #[test]
    fn test_equality_either_side() {
        assert_eq!(names("metric_name = 'cpu'"), vec!["cpu"]);
        assert_eq!(names("'cpu' == metric_name"), vec!["cpu"]);
    }

    #[test]
    fn test_qualified_reference_matches_last_segment() {
        assert_eq!(names("m.metric_name = 'cpu'"), vec!["cpu"]);
    }

    #[test]
    fn test_in_list_and_array_forms() {
        assert_eq!(names("metric_name IN ('cpu', 'mem')"), vec!["cpu", "mem"]);
        assert_eq!(names("metric_name GLOBAL IN ('cpu')"), vec!["cpu"]);
        assert_eq!(names("metric_name IN ['cpu', 'mem']"), vec!["cpu", "mem"]);
        assert_eq!(names("metric_name = any(['cpu', 'mem'])"), vec!["cpu", "mem"]);
    }

    #[test]
    fn test_negative_and_pattern_filters_ignored() {
        assert!(names("metric_name != 'cpu'").is_empty());
        assert!(names("metric_name <> 'cpu'").is_empty());
        assert!(names("metric_name NOT IN ('cpu')").is_empty());
        assert!(names("metric_name LIKE 'cpu%'").is_empty());
        assert!(names("NOT metric_name = 'cpu'").is_empty());
    }

    #[test]
    fn test_function_wrapped_literals_ignored() {
        assert!(names("metric_name = lowercase('cpu')").is_empty());
        assert!(names("metric_name IN lowercase('cpu')").is_empty());
        assert!(names("metric_name = concat('cpu', '_usage')").is_empty());
    }

    #[test]
    fn test_positive_siblings_survive_negations() {
        assert_eq!(
            names("metric_name = 'cpu' OR (metric_name = 'mem' AND metric_name != 'disk')"),
            vec!["cpu", "mem"]
        );
    }

    #[test]
    fn test_in_subquery_contributes_nothing() {
        assert!(names("metric_name IN (SELECT metric_name FROM meta)").is_empty());
    }

    #[test]
    fn test_other_columns_ignored() {
        assert!(names("region = 'us'").is_empty());
        assert!(names("service IN ('cpu')").is_empty());
    }

    #[test]
    fn test_empty_literal_skipped() {
        assert!(names("metric_name = ''").is_empty());
    }

    #[test]
    fn test_conditional_aggregate_and_case() {
        let select = parse_select(
            "SELECT sumIf(value, metric_name = 'cpu'), CASE WHEN metric_name = 'mem' THEN 1 END FROM t",
        )
        .unwrap();
        let first = extract_positive_literals(&select.projection[0].expr, "metric_name");
        let second = extract_positive_literals(&select.projection[1].expr, "metric_name");
        assert!(first.contains("cpu"));
        assert!(second.contains("mem"));
    }
}
