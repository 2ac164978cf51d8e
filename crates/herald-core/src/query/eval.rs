//! Aggregation and boolean expressions
//!
//! JSON forms:
//!
//! | form                              | meaning                       |
//! |-----------------------------------|-------------------------------|
//! | `3`, `true`                       | literal                       |
//! | `"count"`                         | field reference               |
//! | `{"$add": [a, b, ...]}`           | sum of operands (also `$multiply`) |
//! | `{"$subtract": [a, b]}`           | exactly two operands (also `$divide`) |
//! | `{"$gt": [a, b]}`                 | comparison of two operands    |
//! | `{"$sum": e}`                     | aggregate `e` over records    |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HeraldError, Result};

/// Two-operand boolean comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn key(&self) -> &'static str {
        match self {
            Comparison::Eq => "$eq",
            Comparison::Ne => "$ne",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Comparison::Eq),
            "$ne" => Some(Comparison::Ne),
            "$gt" => Some(Comparison::Gt),
            "$gte" => Some(Comparison::Gte),
            "$lt" => Some(Comparison::Lt),
            "$lte" => Some(Comparison::Lte),
            _ => None,
        }
    }
}

/// Terminal aggregator over a record set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Sum,
    Avg,
    Max,
    Min,
    /// Number of distinct values
    Count,
}

impl Aggregator {
    pub fn key(&self) -> &'static str {
        match self {
            Aggregator::Sum => "$sum",
            Aggregator::Avg => "$avg",
            Aggregator::Max => "$max",
            Aggregator::Min => "$min",
            Aggregator::Count => "$count",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$sum" => Some(Aggregator::Sum),
            "$avg" => Some(Aggregator::Avg),
            "$max" => Some(Aggregator::Max),
            "$min" => Some(Aggregator::Min),
            "$count" => Some(Aggregator::Count),
            _ => None,
        }
    }
}

/// An evaluation expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Eval {
    Number(f64),
    Boolean(bool),
    Field(String),
    Add(Vec<Eval>),
    Multiply(Vec<Eval>),
    Subtract(Box<Eval>, Box<Eval>),
    Divide(Box<Eval>, Box<Eval>),
    Compare(Comparison, Box<Eval>, Box<Eval>),
    Aggregate(Aggregator, Box<Eval>),
}

impl Eval {
    pub fn field(name: impl Into<String>) -> Self {
        Eval::Field(name.into())
    }

    pub fn compare(op: Comparison, left: Eval, right: Eval) -> Self {
        Eval::Compare(op, Box::new(left), Box::new(right))
    }

    pub fn aggregate(op: Aggregator, operand: Eval) -> Self {
        Eval::Aggregate(op, Box::new(operand))
    }

    /// Whether an aggregator appears anywhere in the tree
    pub fn is_aggregation(&self) -> bool {
        match self {
            Eval::Number(_) | Eval::Boolean(_) | Eval::Field(_) => false,
            Eval::Add(items) | Eval::Multiply(items) => items.iter().any(Eval::is_aggregation),
            Eval::Subtract(a, b) | Eval::Divide(a, b) | Eval::Compare(_, a, b) => {
                a.is_aggregation() || b.is_aggregation()
            }
            Eval::Aggregate(..) => true,
        }
    }
}

fn operands(key: &str, value: Value) -> Result<Vec<Eval>> {
    match value {
        Value::Array(items) => items.into_iter().map(Eval::try_from).collect(),
        other => Err(HeraldError::invalid_expression(format!(
            "{} expects a list of operands, got {}",
            key, other
        ))),
    }
}

fn pair(key: &str, value: Value) -> Result<(Box<Eval>, Box<Eval>)> {
    let mut items = operands(key, value)?;
    if items.len() != 2 {
        return Err(HeraldError::invalid_expression(format!(
            "{} expects exactly 2 operands, got {}",
            key,
            items.len()
        )));
    }
    let right = items.pop();
    let left = items.pop();
    match (left, right) {
        (Some(left), Some(right)) => Ok((Box::new(left), Box::new(right))),
        _ => Err(HeraldError::invalid_expression(format!("{} is missing operands", key))),
    }
}

impl TryFrom<Value> for Eval {
    type Error = HeraldError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Number(number) => number
                .as_f64()
                .map(Eval::Number)
                .ok_or_else(|| HeraldError::invalid_expression("number out of range")),
            Value::Bool(flag) => Ok(Eval::Boolean(flag)),
            Value::String(field) => Ok(Eval::Field(field)),
            Value::Object(map) => {
                if map.len() != 1 {
                    return Err(HeraldError::invalid_expression(format!(
                        "expression object must have exactly one operator, got {}",
                        map.len()
                    )));
                }
                let Some((key, inner)) = map.into_iter().next() else {
                    return Err(HeraldError::invalid_expression("empty expression"));
                };
                match key.as_str() {
                    "$add" => operands(&key, inner).map(Eval::Add),
                    "$multiply" => operands(&key, inner).map(Eval::Multiply),
                    "$subtract" => pair(&key, inner).map(|(a, b)| Eval::Subtract(a, b)),
                    "$divide" => pair(&key, inner).map(|(a, b)| Eval::Divide(a, b)),
                    other => {
                        if let Some(op) = Comparison::from_key(other) {
                            pair(&key, inner).map(|(a, b)| Eval::Compare(op, a, b))
                        } else if let Some(op) = Aggregator::from_key(other) {
                            Eval::try_from(inner).map(|operand| Eval::aggregate(op, operand))
                        } else {
                            Err(HeraldError::invalid_expression(format!(
                                "unknown operator {}",
                                other
                            )))
                        }
                    }
                }
            }
            other => Err(HeraldError::invalid_expression(format!(
                "unsupported expression: {}",
                other
            ))),
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn list(items: Vec<Eval>) -> Value {
    Value::Array(items.into_iter().map(Value::from).collect())
}

impl From<Eval> for Value {
    fn from(eval: Eval) -> Self {
        match eval {
            Eval::Number(number) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Eval::Boolean(flag) => Value::Bool(flag),
            Eval::Field(field) => Value::String(field),
            Eval::Add(items) => single("$add", list(items)),
            Eval::Multiply(items) => single("$multiply", list(items)),
            Eval::Subtract(a, b) => single("$subtract", list(vec![*a, *b])),
            Eval::Divide(a, b) => single("$divide", list(vec![*a, *b])),
            Eval::Compare(op, a, b) => single(op.key(), list(vec![*a, *b])),
            Eval::Aggregate(op, operand) => single(op.key(), Value::from(*operand)),
        }
    }
}

impl fmt::Display for Eval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_expression() {
        let eval: Eval = serde_json::from_value(json!({
            "$gt": [{ "$add": ["a", 1, { "$multiply": ["b", 2] }] }, 10]
        }))
        .unwrap();

        let Eval::Compare(Comparison::Gt, left, right) = eval else {
            panic!("expected comparison");
        };
        assert!(matches!(*left, Eval::Add(ref items) if items.len() == 3));
        assert_eq!(*right, Eval::Number(10.0));
    }

    #[test]
    fn test_strict_arity() {
        assert!(Eval::try_from(json!({ "$subtract": [1] })).is_err());
        assert!(Eval::try_from(json!({ "$divide": [1, 2, 3] })).is_err());
        assert!(Eval::try_from(json!({ "$eq": [1] })).is_err());
        assert!(Eval::try_from(json!({ "$add": [] })).is_ok());
    }

    #[test]
    fn test_reject_malformed() {
        assert!(Eval::try_from(json!(null)).is_err());
        assert!(Eval::try_from(json!({ "$pow": [1, 2] })).is_err());
        assert!(Eval::try_from(json!({ "$sum": "a", "$avg": "b" })).is_err());
    }

    #[test]
    fn test_aggregation_detection() {
        let eval = Eval::try_from(json!({ "$divide": [{ "$sum": "score" }, 2] })).unwrap();
        assert!(eval.is_aggregation());
        assert!(!Eval::field("score").is_aggregation());
        assert_eq!(Value::from(eval), json!({ "$divide": [{ "$sum": "score" }, 2.0] }));
    }
}
