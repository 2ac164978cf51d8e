//! Query, modifier and aggregation model shared by storage backends

pub mod eval;
pub mod expr;
pub mod resolve;
pub mod table;

pub use eval::{Aggregator, Comparison, Eval};
pub use expr::{FieldExpr, FieldQuery, Pattern, Query, QueryExpr, Shorthand};
pub use resolve::{resolve, resolve_modifier, Modifier, ModifierExpr};
pub use table::{
    FieldDef, FieldType, PrimaryKey, Record, TableConfig, TableExtension, Tables, CHANNEL_TABLE,
    USER_TABLE,
};
