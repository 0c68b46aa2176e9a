//! Classification of ClickHouse functions by what they do to a column.
//!
//! All lookups are case-insensitive.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Aggregate functions without combinator suffixes.
static AGGREGATE_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "count", "sum", "avg", "min", "max", "any", "anylast", "anyheavy", "argmin", "argmax",
        "uniq", "uniqexact", "uniqcombined", "uniqcombined64", "uniqhll12", "uniqtheta",
        "grouparray", "groupuniqarray", "grouparrayinsertat", "groupbitand", "groupbitor",
        "groupbitxor", "quantile", "quantiles", "quantileexact", "quantiletiming",
        "quantiletdigest", "quantiledeterministic", "quantilesexact", "median", "stddevpop",
        "stddevsamp", "varpop", "varsamp", "covarpop", "covarsamp", "corr", "topk",
        "topkweighted", "histogram", "sumwithoverflow", "summap", "minmap", "maxmap",
        "avgweighted", "entropy", "simplelinearregression", "first_value", "last_value",
        "laginframe", "leadinframe", "row_number", "rank", "dense_rank", "deltasum",
    ]
    .into_iter()
    .collect()
});

/// Aggregate combinator suffixes, lower-cased.
const AGGREGATE_COMBINATORS: &[&str] = &[
    "if", "array", "state", "merge", "ornull", "ordefault", "distinct", "foreach", "resample",
    "simplestate",
];

/// Functions that bucket or convert time values.
static TIME_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "todate", "todate32", "todatetime", "todatetime64", "totime", "now", "now64", "today",
        "yesterday", "timeslot", "timeslots", "date_trunc", "datetrunc", "tounixtimestamp",
        "fromunixtimestamp", "fromunixtimestamp64milli", "fromunixtimestamp64micro",
        "fromunixtimestamp64nano", "toyyyymm", "toyyyymmdd", "toyear", "tomonth", "todayofmonth",
        "tohour", "tominute", "tosecond", "totimezone",
    ]
    .into_iter()
    .collect()
});

const TIME_FUNCTION_PREFIXES: &[&str] = &["tostartof", "tointerval", "torelative"];

const JSON_FUNCTION_PREFIXES: &[&str] = &["jsonextract", "simplejsonextract", "visitparamextract"];

static CONDITIONAL_FUNCTIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["if", "multiif"].into_iter().collect());

/// Returns true for aggregate functions, with any chain of combinators
/// (`sumIf`, `uniqArrayIf`, `avgState`, ...).
pub(crate) fn is_aggregate(name: &str) -> bool {
    let mut base = name.to_ascii_lowercase();
    loop {
        if AGGREGATE_FUNCTIONS.contains(base.as_str()) {
            return true;
        }
        let Some(suffix) = AGGREGATE_COMBINATORS
            .iter()
            .find(|suffix| base.len() > suffix.len() && base.ends_with(*suffix))
        else {
            return false;
        };
        base.truncate(base.len() - suffix.len());
    }
}

/// Returns true for `-If` aggregates whose last argument is a condition.
pub(crate) fn is_conditional_aggregate(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower
        .strip_suffix("if")
        .is_some_and(|base| !base.is_empty() && is_aggregate(base))
}

pub(crate) fn is_time_function(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TIME_FUNCTIONS.contains(lower.as_str())
        || TIME_FUNCTION_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
}

/// Returns true for JSON path extraction functions, whose second argument
/// names the extracted key.
pub(crate) fn is_json_extract(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    JSON_FUNCTION_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

pub(crate) fn is_conditional(name: &str) -> bool {
    CONDITIONAL_FUNCTIONS.contains(name.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_with_combinators() {
        assert!(is_aggregate("sum"));
        assert!(is_aggregate("sumIf"));
        assert!(is_aggregate("uniqArrayIf"));
        assert!(is_aggregate("avgState"));
        assert!(is_aggregate("groupArray"));
        assert!(!is_aggregate("multiIf"));
        assert!(!is_aggregate("arrayMap"));
        assert!(!is_aggregate("JSONExtractString"));
    }

    #[test]
    fn test_conditional_aggregate() {
        assert!(is_conditional_aggregate("maxIf"));
        assert!(is_conditional_aggregate("countIf"));
        assert!(!is_conditional_aggregate("if"));
        assert!(!is_conditional_aggregate("multiIf"));
        assert!(!is_conditional_aggregate("sum"));
    }

    #[test]
    fn test_time_functions() {
        assert!(is_time_function("toDate"));
        assert!(is_time_function("toStartOfInterval"));
        assert!(is_time_function("toStartOfFiveMinutes"));
        assert!(is_time_function("toIntervalSecond"));
        assert!(!is_time_function("lower"));
    }

    #[test]
    fn test_json_and_conditionals() {
        assert!(is_json_extract("JSONExtractString"));
        assert!(is_json_extract("simpleJSONExtractRaw"));
        assert!(is_json_extract("visitParamExtractString"));
        assert!(!is_json_extract("extract"));
        assert!(is_conditional("If"));
        assert!(is_conditional("multiIf"));
        assert!(!is_conditional("ifNull"));
    }
}
