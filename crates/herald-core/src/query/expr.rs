//! Query expression tree
//!
//! The JSON shape mirrors the document-store convention: logical operators
//! and field operators are `$`-prefixed keys, every other key names a field.
//!
//! ```
//! use herald_core::query::QueryExpr;
//! use serde_json::json;
//!
//! let query: QueryExpr = serde_json::from_value(json!({
//!     "$or": [{ "platform": "mock", "assignee": ["1", "2"] }],
//!     "flag": { "$bitsAllClear": 1 },
//! }))
//! .unwrap();
//! assert_eq!(query.or.as_ref().map(Vec::len), Some(1));
//! assert!(query.fields.contains_key("flag"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::{HeraldError, Result};
use crate::query::eval::Eval;

/// A compiled regular expression compared by source text
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// # Errors
    ///
    /// Returns `InvalidExpression` when `source` is not a valid regex.
    pub fn new(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Pattern)
            .map_err(|err| HeraldError::invalid_expression(err.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern(regex)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// Explicit field operators; every present operator must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldExpr {
    #[serde(rename = "$eq", default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(rename = "$ne", default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<Value>,
    #[serde(rename = "$gt", default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(rename = "$lt", default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(rename = "$lte", default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(rename = "$in", default, skip_serializing_if = "Option::is_none")]
    pub r#in: Option<Vec<Value>>,
    #[serde(rename = "$nin", default, skip_serializing_if = "Option::is_none")]
    pub nin: Option<Vec<Value>>,
    /// Some element of a list field matches
    #[serde(rename = "$el", default, skip_serializing_if = "Option::is_none")]
    pub el: Option<Box<FieldQuery>>,
    /// Length of a list field
    #[serde(rename = "$size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(rename = "$regex", default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<Pattern>,
    /// The field holds a pattern that must match this text
    #[serde(rename = "$regexFor", default, skip_serializing_if = "Option::is_none")]
    pub regex_for: Option<String>,
    #[serde(rename = "$bitsAllSet", default, skip_serializing_if = "Option::is_none")]
    pub bits_all_set: Option<u64>,
    #[serde(rename = "$bitsAllClear", default, skip_serializing_if = "Option::is_none")]
    pub bits_all_clear: Option<u64>,
    #[serde(rename = "$bitsAnySet", default, skip_serializing_if = "Option::is_none")]
    pub bits_any_set: Option<u64>,
    #[serde(rename = "$bitsAnyClear", default, skip_serializing_if = "Option::is_none")]
    pub bits_any_clear: Option<u64>,
}

/// Predicate on a single field
///
/// The shorthand forms mean equality, set membership and pattern match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FieldQuery {
    Value(Value),
    List(Vec<Value>),
    Regex(Pattern),
    Expr(FieldExpr),
}

impl TryFrom<Value> for FieldQuery {
    type Error = HeraldError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(FieldQuery::List(items)),
            Value::Object(map) if is_operator_object(&map) => {
                let expr: FieldExpr = serde_json::from_value(Value::Object(map))
                    .map_err(|err| HeraldError::invalid_expression(err.to_string()))?;
                Ok(FieldQuery::Expr(expr))
            }
            other => Ok(FieldQuery::Value(other)),
        }
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

impl From<FieldQuery> for Value {
    fn from(query: FieldQuery) -> Self {
        match query {
            FieldQuery::Value(value) => value,
            FieldQuery::List(items) => Value::Array(items),
            FieldQuery::Regex(pattern) => {
                let mut map = Map::new();
                map.insert("$regex".to_string(), Value::String(pattern.as_str().to_string()));
                Value::Object(map)
            }
            FieldQuery::Expr(expr) => serde_json::to_value(expr).unwrap_or(Value::Null),
        }
    }
}

impl From<&str> for FieldQuery {
    fn from(text: &str) -> Self {
        FieldQuery::Value(Value::String(text.to_string()))
    }
}

impl From<String> for FieldQuery {
    fn from(text: String) -> Self {
        FieldQuery::Value(Value::String(text))
    }
}

impl From<i64> for FieldQuery {
    fn from(number: i64) -> Self {
        FieldQuery::Value(Value::from(number))
    }
}

impl From<Vec<Value>> for FieldQuery {
    fn from(items: Vec<Value>) -> Self {
        FieldQuery::List(items)
    }
}

impl From<Vec<String>> for FieldQuery {
    fn from(items: Vec<String>) -> Self {
        FieldQuery::List(items.into_iter().map(Value::String).collect())
    }
}

impl From<Pattern> for FieldQuery {
    fn from(pattern: Pattern) -> Self {
        FieldQuery::Regex(pattern)
    }
}

impl From<FieldExpr> for FieldQuery {
    fn from(expr: FieldExpr) -> Self {
        FieldQuery::Expr(expr)
    }
}

/// Logical composition of field predicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryExpr {
    /// Any branch holds; an empty list matches nothing
    #[serde(rename = "$or", default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<QueryExpr>>,
    /// Every branch holds
    #[serde(rename = "$and", default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<QueryExpr>>,
    #[serde(rename = "$not", default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<QueryExpr>>,
    /// Boolean aggregation expression evaluated per record
    #[serde(rename = "$expr", default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<Eval>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldQuery>,
}

impl QueryExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, query: impl Into<FieldQuery>) -> Self {
        self.fields.insert(name.into(), query.into());
        self
    }

    pub fn or(mut self, branches: Vec<QueryExpr>) -> Self {
        self.or = Some(branches);
        self
    }

    pub fn and(mut self, branches: Vec<QueryExpr>) -> Self {
        self.and = Some(branches);
        self
    }

    pub fn not(mut self, inner: QueryExpr) -> Self {
        self.not = Some(Box::new(inner));
        self
    }

    pub fn with_expr(mut self, expr: Eval) -> Self {
        self.expr = Some(expr);
        self
    }
}

/// Shorthand against the table's single primary key
#[derive(Debug, Clone, PartialEq)]
pub enum Shorthand {
    Scalar(Value),
    List(Vec<Value>),
    Regex(Pattern),
}

impl From<Shorthand> for FieldQuery {
    fn from(shorthand: Shorthand) -> Self {
        match shorthand {
            Shorthand::Scalar(value) => FieldQuery::Value(value),
            Shorthand::List(items) => FieldQuery::List(items),
            Shorthand::Regex(pattern) => FieldQuery::Regex(pattern),
        }
    }
}

/// A query as supplied by callers, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Shorthand(Shorthand),
    Expr(QueryExpr),
}

impl Default for Query {
    fn default() -> Self {
        Query::Expr(QueryExpr::default())
    }
}

impl Query {
    /// Interpret a JSON value: strings and numbers are scalar shorthand,
    /// arrays are list shorthand, objects are expressions
    ///
    /// # Errors
    ///
    /// Returns `InvalidExpression` for `null`, booleans and malformed objects.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(_) | Value::Number(_) => Ok(Query::Shorthand(Shorthand::Scalar(value))),
            Value::Array(items) => Ok(Query::Shorthand(Shorthand::List(items))),
            Value::Object(map) => serde_json::from_value(Value::Object(map))
                .map(Query::Expr)
                .map_err(|err| HeraldError::invalid_expression(err.to_string())),
            other => Err(HeraldError::invalid_expression(format!(
                "unsupported query value: {}",
                other
            ))),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Shorthand(Shorthand::Scalar(Value::String(text.to_string())))
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Shorthand(Shorthand::Scalar(Value::String(text)))
    }
}

impl From<i64> for Query {
    fn from(number: i64) -> Self {
        Query::Shorthand(Shorthand::Scalar(Value::from(number)))
    }
}

impl From<Vec<Value>> for Query {
    fn from(items: Vec<Value>) -> Self {
        Query::Shorthand(Shorthand::List(items))
    }
}

impl From<Pattern> for Query {
    fn from(pattern: Pattern) -> Self {
        Query::Shorthand(Shorthand::Regex(pattern))
    }
}

impl From<QueryExpr> for Query {
    fn from(expr: QueryExpr) -> Self {
        Query::Expr(expr)
    }
}
