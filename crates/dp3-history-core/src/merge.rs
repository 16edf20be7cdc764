//! Pure merge engine: `mergeable`/`merge`, parameterized by the attribute's
//! three aggregation-function selectors.

use std::collections::BTreeSet;

use crate::attrspec::{AggregationFunction, HistoryParams};
use crate::datapoint::Datapoint;
use crate::value::Value;

/// `mergeable(a, b, params)` — AND of the per-field checks.
pub fn mergeable(a: &Datapoint, b: &Datapoint, params: &HistoryParams) -> bool {
    value_mergeable(params.aggregation_function_value, &a.v, &b.v)
        && confidence_mergeable(params.aggregation_function_confidence, a.c, b.c)
        && source_mergeable(params.aggregation_function_source, &a.src, &b.src)
}

fn value_mergeable(f: AggregationFunction, a: &Value, b: &Value) -> bool {
    match f {
        AggregationFunction::Keep => values_equal(a, b),
        AggregationFunction::Add | AggregationFunction::Avg | AggregationFunction::CsvUnion => true,
    }
}

fn confidence_mergeable(f: AggregationFunction, a: f64, b: f64) -> bool {
    match f {
        AggregationFunction::Keep => a == b,
        _ => true,
    }
}

fn source_mergeable(f: AggregationFunction, a: &str, b: &str) -> bool {
    match f {
        AggregationFunction::Keep => a == b,
        _ => true,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// `merge(a, b, params)` — mutates `a` in place. The resulting interval is
/// always the envelope `[min(a.t1,b.t1), max(a.t2,b.t2)]`.
pub fn merge(a: &mut Datapoint, b: &Datapoint, params: &HistoryParams) {
    a.v = apply_value(params.aggregation_function_value, &a.v, &b.v);
    a.c = apply_confidence(params.aggregation_function_confidence, a.c, b.c);
    a.src = apply_source(params.aggregation_function_source, &a.src, &b.src);
    a.t1 = a.t1.min(b.t1);
    a.t2 = a.t2.max(b.t2);
}

fn apply_value(f: AggregationFunction, a: &Value, b: &Value) -> Value {
    match f {
        AggregationFunction::Keep => a.clone(),
        AggregationFunction::Add => numeric_op(a, b, |x, y| x + y),
        AggregationFunction::Avg => numeric_op(a, b, |x, y| (x + y) / 2.0),
        AggregationFunction::CsvUnion => Value::Str(csv_union(a.as_str().unwrap_or(""), b.as_str().unwrap_or(""))),
    }
}

fn numeric_op(a: &Value, b: &Value, op: impl Fn(f64, f64) -> f64) -> Value {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(op(*x as f64, *y as f64) as i64),
        _ => {
            let x = a.as_f64().unwrap_or(0.0);
            let y = b.as_f64().unwrap_or(0.0);
            Value::Float(op(x, y))
        }
    }
}

fn apply_confidence(f: AggregationFunction, a: f64, b: f64) -> f64 {
    match f {
        AggregationFunction::Keep => a,
        AggregationFunction::Add => a + b,
        AggregationFunction::Avg => (a + b) / 2.0,
        AggregationFunction::CsvUnion => a,
    }
}

fn apply_source(f: AggregationFunction, a: &str, b: &str) -> String {
    match f {
        AggregationFunction::Keep => a.to_string(),
        AggregationFunction::Add => format!("{a}{b}"),
        AggregationFunction::Avg => a.to_string(),
        AggregationFunction::CsvUnion => csv_union(a, b),
    }
}

/// Comma-separated union of CSV source tokens.
fn csv_union(a: &str, b: &str) -> String {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for token in a.split(',').chain(b.split(',')) {
        if token.is_empty() {
            continue;
        }
        if seen.insert(token) {
            ordered.push(token);
        }
    }
    ordered.join(",")
}
