//! Normalization of caller-supplied queries and modifiers

use serde::{Deserialize, Serialize};

use crate::errors::{HeraldError, Result};
use crate::query::expr::{Query, QueryExpr};
use crate::query::table::{PrimaryKey, TableConfig};

/// Normalize `query` into an expression tree for `table`
///
/// Shorthand forms compare against the primary key, which must be a single
/// field.
///
/// ```
/// use herald_core::query::{resolve, FieldQuery, Query, Tables};
/// use serde_json::json;
///
/// let tables = Tables::with_defaults();
/// let user = tables.get("user").unwrap();
/// let expr = resolve(user, Query::from("42")).unwrap();
/// assert_eq!(expr.fields.get("id"), Some(&FieldQuery::Value(json!("42"))));
/// ```
///
/// # Errors
///
/// Returns `InvalidQuery` when a shorthand is used on a composite key, or when
/// the expression names a field starting with `$` that is not an operator.
pub fn resolve(table: &TableConfig, query: Query) -> Result<QueryExpr> {
    match query {
        Query::Shorthand(shorthand) => match &table.primary {
            PrimaryKey::Single(key) => Ok(QueryExpr::new().field(key.clone(), shorthand)),
            PrimaryKey::Composite(_) => Err(HeraldError::invalid_query(
                &table.name,
                "shorthand query requires a single primary key",
            )),
        },
        Query::Expr(expr) => {
            check_field_names(&table.name, &expr)?;
            Ok(expr)
        }
    }
}

fn check_field_names(table: &str, expr: &QueryExpr) -> Result<()> {
    if let Some(name) = expr.fields.keys().find(|name| name.starts_with('$')) {
        return Err(HeraldError::invalid_query(
            table,
            format!("unknown operator {}", name),
        ));
    }
    let branches = expr
        .or
        .iter()
        .chain(expr.and.iter())
        .flatten()
        .chain(expr.not.as_deref());
    for branch in branches {
        check_field_names(table, branch)?;
    }
    Ok(())
}

/// Projection and paging options for `get`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierExpr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Fields to project; `None` keeps every field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl ModifierExpr {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// A modifier as supplied by callers; a bare list is a projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Modifier {
    Fields(Vec<String>),
    Expr(ModifierExpr),
}

impl<S: Into<String>> FromIterator<S> for Modifier {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Modifier::Fields(iter.into_iter().map(Into::into).collect())
    }
}

impl From<ModifierExpr> for Modifier {
    fn from(expr: ModifierExpr) -> Self {
        Modifier::Expr(expr)
    }
}

pub fn resolve_modifier(modifier: Option<Modifier>) -> ModifierExpr {
    match modifier {
        None => ModifierExpr::default(),
        Some(Modifier::Fields(fields)) => ModifierExpr {
            fields: Some(fields),
            ..ModifierExpr::default()
        },
        Some(Modifier::Expr(expr)) => expr,
    }
}
