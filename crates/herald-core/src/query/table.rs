//! Table declarations
//!
//! Field definitions are written as `type` or `type(args)`, e.g.
//! `string(63)`, `unsigned(20)`, `decimal(10,2)`, `json`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{HeraldError, Result};

pub const USER_TABLE: &str = "user";
pub const CHANNEL_TABLE: &str = "channel";

/// A stored record
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Unsigned,
    Float,
    Double,
    Decimal,
    Char,
    String,
    Text,
    Timestamp,
    Date,
    Time,
    List,
    Json,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer
                | FieldType::Unsigned
                | FieldType::Float
                | FieldType::Double
                | FieldType::Decimal
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Char | FieldType::String | FieldType::Text)
    }

    /// Value a freshly created record starts with, if any
    pub fn initial(&self) -> Option<Value> {
        if self.is_numeric() {
            Some(Value::from(0))
        } else if self.is_textual() {
            Some(Value::String(String::new()))
        } else {
            match self {
                FieldType::List => Some(Value::Array(Vec::new())),
                FieldType::Json => Some(Value::Object(Map::new())),
                _ => None,
            }
        }
    }
}

impl FromStr for FieldType {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "integer" => FieldType::Integer,
            "unsigned" => FieldType::Unsigned,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "decimal" => FieldType::Decimal,
            "char" => FieldType::Char,
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "timestamp" => FieldType::Timestamp,
            "date" => FieldType::Date,
            "time" => FieldType::Time,
            "list" => FieldType::List,
            "json" => FieldType::Json,
            other => {
                return Err(HeraldError::InvalidFieldDefinition {
                    definition: other.to_string(),
                })
            }
        })
    }
}

/// A parsed field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub kind: FieldType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub initial: Option<Value>,
}

fn definition_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)(?:\((.+)\))?$").ok())
        .as_ref()
}

impl FieldDef {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            length: None,
            precision: None,
            scale: None,
            nullable: false,
            initial: kind.initial(),
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Parse `type` or `type(args)`
    ///
    /// ```
    /// use herald_core::query::{FieldDef, FieldType};
    ///
    /// let money = FieldDef::parse("decimal(10,2)").unwrap();
    /// assert_eq!(money.kind, FieldType::Decimal);
    /// assert_eq!((money.precision, money.scale), (Some(10), Some(2)));
    ///
    /// let name = FieldDef::parse("string(63)").unwrap();
    /// assert_eq!(name.length, Some(63));
    /// assert_eq!(name.initial, Some(serde_json::json!("")));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldDefinition` for unknown types or malformed
    /// arguments.
    pub fn parse(definition: &str) -> Result<Self> {
        let invalid = || HeraldError::InvalidFieldDefinition {
            definition: definition.to_string(),
        };

        let captures = definition_regex()
            .and_then(|re| re.captures(definition.trim()))
            .ok_or_else(invalid)?;
        let kind: FieldType = captures
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .parse()
            .map_err(|_| invalid())?;
        let args: Vec<&str> = captures
            .get(2)
            .map(|m| m.as_str().split(',').map(str::trim).collect())
            .unwrap_or_default();

        let number = |index: usize| -> Result<Option<u32>> {
            match args.get(index) {
                Some(arg) if !arg.is_empty() => arg.parse().map(Some).map_err(|_| invalid()),
                _ => Ok(None),
            }
        };

        let mut field = FieldDef::new(kind);
        if kind == FieldType::Decimal {
            field.precision = number(0)?;
            field.scale = number(1)?;
        } else {
            field.length = number(0)?;
        }
        Ok(field)
    }
}

/// Primary key of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    pub fn fields(&self) -> Vec<String> {
        match self {
            PrimaryKey::Single(field) => vec![field.clone()],
            PrimaryKey::Composite(fields) => fields.clone(),
        }
    }
}

impl Default for PrimaryKey {
    fn default() -> Self {
        PrimaryKey::Single("id".to_string())
    }
}

/// Table-level options merged by [`Tables::extend`]
#[derive(Debug, Clone, Default)]
pub struct TableExtension {
    pub primary: Option<PrimaryKey>,
    pub auto_inc: bool,
    pub unique: Vec<Vec<String>>,
    /// field -> (table, field)
    pub foreign: BTreeMap<String, (String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub name: String,
    pub primary: PrimaryKey,
    pub auto_inc: bool,
    pub unique: Vec<Vec<String>>,
    pub foreign: BTreeMap<String, (String, String)>,
    pub fields: BTreeMap<String, FieldDef>,
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: PrimaryKey::default(),
            auto_inc: false,
            unique: Vec::new(),
            foreign: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }
}

/// Table declarations known to the runtime
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: BTreeMap<String, TableConfig>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `user` and `channel` tables
    pub fn with_defaults() -> Self {
        let name = || FieldDef::new(FieldType::String).with_length(63);
        let flag = || FieldDef::new(FieldType::Unsigned).with_length(20);

        let mut tables = Self::new();
        tables.merge(
            USER_TABLE,
            vec![
                ("id", name()),
                ("name", name()),
                ("flag", flag()),
                ("authority", FieldDef::new(FieldType::Unsigned).with_length(4)),
                ("usage", FieldDef::new(FieldType::Json)),
                ("timers", FieldDef::new(FieldType::Json)),
            ],
            TableExtension {
                auto_inc: true,
                ..TableExtension::default()
            },
        );
        tables.merge(
            CHANNEL_TABLE,
            vec![
                ("id", name()),
                ("platform", name()),
                ("flag", flag()),
                ("assignee", name()),
                ("disable", FieldDef::new(FieldType::List)),
            ],
            TableExtension {
                primary: Some(PrimaryKey::Composite(vec![
                    "id".to_string(),
                    "platform".to_string(),
                ])),
                ..TableExtension::default()
            },
        );
        tables
    }

    /// Declare or extend a table
    ///
    /// A primary key in `extension` replaces the current one, unique groups
    /// and foreign keys accumulate, and field definitions override by name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldDefinition` if any definition fails to parse; the
    /// table is left unchanged in that case.
    pub fn extend(
        &mut self,
        name: &str,
        fields: &[(&str, &str)],
        extension: TableExtension,
    ) -> Result<()> {
        let parsed = fields
            .iter()
            .map(|(field, definition)| Ok((*field, FieldDef::parse(definition)?)))
            .collect::<Result<Vec<_>>>()?;
        self.merge(name, parsed, extension);
        Ok(())
    }

    fn merge(&mut self, name: &str, fields: Vec<(&str, FieldDef)>, extension: TableExtension) {
        let table = self
            .tables
            .entry(name.to_string())
            .or_insert_with(|| TableConfig::new(name));
        if let Some(primary) = extension.primary {
            table.primary = primary;
        }
        table.auto_inc |= extension.auto_inc;
        table.unique.extend(extension.unique);
        table.foreign.extend(extension.foreign);
        table
            .fields
            .extend(fields.into_iter().map(|(field, def)| (field.to_string(), def)));
    }

    /// # Errors
    ///
    /// Returns `UnknownTable` when `name` has not been declared.
    pub fn get(&self, name: &str) -> Result<&TableConfig> {
        self.tables.get(name).ok_or_else(|| HeraldError::UnknownTable {
            table: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// A record holding every field's initial value, primary key excluded
    ///
    /// Only a single-field primary key is excluded; composite key fields get
    /// their initial values like any other field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTable` when `name` has not been declared.
    pub fn create(&self, name: &str) -> Result<Record> {
        let table = self.get(name)?;
        let mut record = Record::new();
        for (field, def) in &table.fields {
            if matches!(&table.primary, PrimaryKey::Single(key) if key == field) {
                continue;
            }
            if let Some(initial) = &def.initial {
                record.insert(field.clone(), initial.clone());
            }
        }
        Ok(record)
    }
}
