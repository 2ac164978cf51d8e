//! Reference interpreter for queries, modifiers and aggregation expressions
//!
//! Every backend is expected to agree with these functions on the records it
//! returns. Comparisons treat all JSON numbers as `f64`; strings and booleans
//! compare with their natural order; any other pairing never satisfies an
//! ordering operator. Arithmetic over a non-numeric operand yields `null`, and
//! aggregators skip non-numeric values.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use herald_core::errors::{HeraldError, Result};
use herald_core::query::{Aggregator, Comparison, Eval, FieldExpr, FieldQuery, ModifierExpr, QueryExpr, Record};
use regex::Regex;
use serde_json::Value;

/// Whether `record` satisfies `expr`
///
/// # Errors
///
/// Returns `InvalidExpression` when a `$expr` clause uses an aggregator.
pub fn matches(expr: &QueryExpr, record: &Record) -> Result<bool> {
    if let Some(branches) = &expr.or {
        let mut any = false;
        for branch in branches {
            if matches(branch, record)? {
                any = true;
                break;
            }
        }
        if !any {
            return Ok(false);
        }
    }
    if let Some(branches) = &expr.and {
        for branch in branches {
            if !matches(branch, record)? {
                return Ok(false);
            }
        }
    }
    if let Some(inner) = &expr.not {
        if matches(inner, record)? {
            return Ok(false);
        }
    }
    if let Some(eval) = &expr.expr {
        if evaluate(eval, record)? != Value::Bool(true) {
            return Ok(false);
        }
    }
    Ok(expr
        .fields
        .iter()
        .all(|(name, query)| matches_field(query, record.get(name))))
}

/// Whether a field value satisfies a field predicate; `None` is a missing field
pub fn matches_field(query: &FieldQuery, value: Option<&Value>) -> bool {
    match query {
        FieldQuery::Value(expected) => value.is_some_and(|v| values_equal(v, expected)),
        FieldQuery::List(items) => value.is_some_and(|v| contains(items, v)),
        FieldQuery::Regex(pattern) => value
            .and_then(Value::as_str)
            .is_some_and(|text| pattern.is_match(text)),
        FieldQuery::Expr(expr) => matches_expr(expr, value),
    }
}

fn matches_expr(expr: &FieldExpr, value: Option<&Value>) -> bool {
    let ordered = |bound: &Option<Value>, accept: fn(Ordering) -> bool| match bound {
        None => true,
        Some(bound) => value
            .and_then(|v| compare_values(v, bound))
            .is_some_and(accept),
    };

    if let Some(expected) = &expr.eq {
        if !value.is_some_and(|v| values_equal(v, expected)) {
            return false;
        }
    }
    if let Some(unexpected) = &expr.ne {
        if value.is_some_and(|v| values_equal(v, unexpected)) {
            return false;
        }
    }
    if !(ordered(&expr.gt, Ordering::is_gt)
        && ordered(&expr.gte, Ordering::is_ge)
        && ordered(&expr.lt, Ordering::is_lt)
        && ordered(&expr.lte, Ordering::is_le))
    {
        return false;
    }
    if let Some(items) = &expr.r#in {
        if !value.is_some_and(|v| contains(items, v)) {
            return false;
        }
    }
    if let Some(items) = &expr.nin {
        if value.is_some_and(|v| contains(items, v)) {
            return false;
        }
    }
    if let Some(inner) = &expr.el {
        let any = value
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|item| matches_field(inner, Some(item))));
        if !any {
            return false;
        }
    }
    if let Some(size) = expr.size {
        if value.and_then(Value::as_array).map(Vec::len) != Some(size) {
            return false;
        }
    }
    if let Some(pattern) = &expr.regex {
        if !value.and_then(Value::as_str).is_some_and(|text| pattern.is_match(text)) {
            return false;
        }
    }
    if let Some(text) = &expr.regex_for {
        let matched = value
            .and_then(Value::as_str)
            .and_then(|source| Regex::new(source).ok())
            .is_some_and(|pattern| pattern.is_match(text));
        if !matched {
            return false;
        }
    }

    let bits = value.and_then(Value::as_u64);
    let bit_checks: [(Option<u64>, fn(u64, u64) -> bool); 4] = [
        (expr.bits_all_set, |v, mask| v & mask == mask),
        (expr.bits_all_clear, |v, mask| v & mask == 0),
        (expr.bits_any_set, |v, mask| v & mask != 0),
        (expr.bits_any_clear, |v, mask| v & mask != mask),
    ];
    bit_checks.iter().all(|(mask, check)| match mask {
        None => true,
        Some(mask) => bits.is_some_and(|v| check(v, *mask)),
    })
}

fn contains(items: &[Value], value: &Value) -> bool {
    items.iter().any(|item| values_equal(value, item))
}

/// JSON equality with numbers compared by value
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Natural order of two values of the same kind
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A JSON number, integral when `n` has no fractional part
pub fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

enum Scope<'a> {
    Row(&'a Record),
    Set(&'a [Record]),
}

/// Evaluate a per-record expression
///
/// # Errors
///
/// Returns `InvalidExpression` when the expression contains an aggregator.
pub fn evaluate(eval: &Eval, record: &Record) -> Result<Value> {
    compute(eval, &Scope::Row(record))
}

/// Evaluate an aggregation expression over a record set
///
/// Field references must sit inside an aggregator.
///
/// ```
/// use herald_core::query::{Eval, Record};
/// use herald_store::exec::aggregate;
/// use serde_json::json;
///
/// let records: Vec<Record> = [1, 2, 3]
///     .iter()
///     .map(|n| json!({ "score": n }).as_object().cloned().unwrap())
///     .collect();
/// let total = Eval::try_from(json!({ "$add": [{ "$sum": "score" }, 10] })).unwrap();
/// assert_eq!(aggregate(&total, &records).unwrap(), json!(16));
/// ```
///
/// # Errors
///
/// Returns `InvalidExpression` for a bare field reference outside an
/// aggregator, or an aggregator nested inside another.
pub fn aggregate(eval: &Eval, records: &[Record]) -> Result<Value> {
    compute(eval, &Scope::Set(records))
}

fn compute(eval: &Eval, scope: &Scope<'_>) -> Result<Value> {
    match eval {
        Eval::Number(n) => Ok(number(*n)),
        Eval::Boolean(flag) => Ok(Value::Bool(*flag)),
        Eval::Field(name) => match scope {
            Scope::Row(record) => Ok(record.get(name).cloned().unwrap_or(Value::Null)),
            Scope::Set(_) => Err(HeraldError::invalid_expression(format!(
                "field {} must be wrapped in an aggregator",
                name
            ))),
        },
        Eval::Add(items) => fold(items, scope, 0.0, |a, b| a + b),
        Eval::Multiply(items) => fold(items, scope, 1.0, |a, b| a * b),
        Eval::Subtract(a, b) => binary(a, b, scope, |a, b| a - b),
        Eval::Divide(a, b) => binary(a, b, scope, |a, b| a / b),
        Eval::Compare(op, a, b) => {
            let left = compute(a, scope)?;
            let right = compute(b, scope)?;
            let holds = match op {
                Comparison::Eq => values_equal(&left, &right),
                Comparison::Ne => !values_equal(&left, &right),
                Comparison::Gt => compare_values(&left, &right).is_some_and(Ordering::is_gt),
                Comparison::Gte => compare_values(&left, &right).is_some_and(Ordering::is_ge),
                Comparison::Lt => compare_values(&left, &right).is_some_and(Ordering::is_lt),
                Comparison::Lte => compare_values(&left, &right).is_some_and(Ordering::is_le),
            };
            Ok(Value::Bool(holds))
        }
        Eval::Aggregate(op, operand) => match scope {
            Scope::Set(records) => aggregate_over(*op, operand, records),
            Scope::Row(_) => Err(HeraldError::invalid_expression(format!(
                "{} cannot be evaluated against a single record",
                op.key()
            ))),
        },
    }
}

fn fold(items: &[Eval], scope: &Scope<'_>, init: f64, op: fn(f64, f64) -> f64) -> Result<Value> {
    let mut acc = init;
    for item in items {
        match compute(item, scope)?.as_f64() {
            Some(n) => acc = op(acc, n),
            None => return Ok(Value::Null),
        }
    }
    Ok(number(acc))
}

fn binary(a: &Eval, b: &Eval, scope: &Scope<'_>, op: fn(f64, f64) -> f64) -> Result<Value> {
    let left = compute(a, scope)?.as_f64();
    let right = compute(b, scope)?.as_f64();
    Ok(match (left, right) {
        (Some(left), Some(right)) => number(op(left, right)),
        _ => Value::Null,
    })
}

fn aggregate_over(op: Aggregator, operand: &Eval, records: &[Record]) -> Result<Value> {
    let values = records
        .iter()
        .map(|record| compute(operand, &Scope::Row(record)))
        .collect::<Result<Vec<_>>>()?;

    // Missing and null operands count as one distinct value
    if op == Aggregator::Count {
        let distinct: BTreeSet<String> = values.iter().map(Value::to_string).collect();
        return Ok(Value::from(distinct.len()));
    }

    let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    let result = match op {
        Aggregator::Sum => number(numbers.iter().sum()),
        Aggregator::Avg if numbers.is_empty() => Value::Null,
        Aggregator::Avg => number(numbers.iter().sum::<f64>() / numbers.len() as f64),
        Aggregator::Max => numbers
            .iter()
            .copied()
            .reduce(f64::max)
            .map_or(Value::Null, number),
        Aggregator::Min => numbers
            .iter()
            .copied()
            .reduce(f64::min)
            .map_or(Value::Null, number),
        Aggregator::Count => Value::Null,
    };
    Ok(result)
}

/// Apply offset, limit and projection, in that order
pub fn apply_modifier(records: Vec<Record>, modifier: &ModifierExpr) -> Vec<Record> {
    records
        .into_iter()
        .skip(modifier.offset.unwrap_or(0))
        .take(modifier.limit.unwrap_or(usize::MAX))
        .map(|record| match &modifier.fields {
            Some(fields) => project(record, fields),
            None => record,
        })
        .collect()
}

fn project(mut record: Record, fields: &[String]) -> Record {
    record.retain(|key, _| fields.iter().any(|field| field == key));
    record
}
