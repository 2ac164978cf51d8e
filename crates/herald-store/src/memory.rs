//! In-memory Storage collaborator
//!
//! Records live in per-table vectors in insertion order. Every operation
//! resolves its query against the declared table first, so shorthand queries
//! on composite keys and unknown tables fail the same way they would on any
//! other backend. Writes that would repeat a primary key or a declared unique
//! group are rejected.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use herald_core::database::Storage;
use herald_core::errors::HeraldError;
use herald_core::query::{
    resolve, resolve_modifier, Eval, Modifier, PrimaryKey, Query, QueryExpr, Record, TableConfig,
    Tables,
};
use serde_json::Value;

use crate::errors::{duplicate_key, poisoned, Result};
use crate::exec::{aggregate, apply_modifier, matches, values_equal};

#[derive(Debug, Clone, Default)]
struct TableData {
    records: Vec<Record>,
    next_id: u64,
}

/// Storage backed by process memory
#[derive(Debug)]
pub struct MemoryStore {
    tables: Tables,
    data: RwLock<BTreeMap<String, TableData>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Tables::with_defaults())
    }
}

impl MemoryStore {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables,
            data: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Number of records currently stored in `table`
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lock is poisoned.
    pub fn count(&self, table: &str) -> Result<usize> {
        Ok(self
            .read("count")?
            .get(table)
            .map_or(0, |data| data.records.len()))
    }

    fn read(&self, op: &str) -> Result<RwLockReadGuard<'_, BTreeMap<String, TableData>>> {
        self.data.read().map_err(|_| poisoned(op))
    }

    fn write(&self, op: &str) -> Result<RwLockWriteGuard<'_, BTreeMap<String, TableData>>> {
        self.data.write().map_err(|_| poisoned(op))
    }

    fn select(&self, table: &str, query: Query) -> Result<QueryExpr> {
        resolve(self.tables.get(table)?, query)
    }
}

fn key_fields(config: &TableConfig, keys: Option<Vec<String>>) -> Vec<String> {
    keys.unwrap_or_else(|| config.primary.fields())
}

fn same_key(a: &Record, b: &Record, keys: &[String]) -> bool {
    keys.iter().all(|key| match (a.get(key), b.get(key)) {
        (Some(x), Some(y)) => values_equal(x, y),
        _ => false,
    })
}

fn describe_key(record: &Record, keys: &[String]) -> String {
    keys.iter()
        .map(|key| {
            let value = record.get(key).map_or_else(|| "null".to_string(), Value::to_string);
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Describe the first unique group on which `record` matches another
/// record, skipping the one at `skip`
///
/// Missing and null values never collide.
fn unique_violation(
    config: &TableConfig,
    records: &[Record],
    record: &Record,
    skip: Option<usize>,
) -> Option<String> {
    config.unique.iter().find_map(|group| {
        let clash = !group.is_empty()
            && records.iter().enumerate().any(|(index, existing)| {
                Some(index) != skip
                    && group.iter().all(|key| match (existing.get(key), record.get(key)) {
                        (Some(x), Some(y)) => !x.is_null() && values_equal(x, y),
                        _ => false,
                    })
            });
        clash.then(|| describe_key(record, group))
    })
}

/// Build a full record from initial values and `data`, assigning an
/// auto-increment id when the table asks for one and `data` lacks it
fn materialize(
    tables: &Tables,
    config: &TableConfig,
    store: &mut TableData,
    data: Record,
) -> Result<Record> {
    let mut record = tables.create(&config.name)?;
    record.extend(data);

    if let (true, PrimaryKey::Single(key)) = (config.auto_inc, &config.primary) {
        match record.get(key) {
            None | Some(Value::Null) => {
                store.next_id += 1;
                let numeric = config
                    .fields
                    .get(key)
                    .is_some_and(|field| field.kind.is_numeric());
                let id = if numeric {
                    Value::from(store.next_id)
                } else {
                    Value::String(store.next_id.to_string())
                };
                record.insert(key.clone(), id);
            }
            Some(existing) => {
                let explicit = existing
                    .as_u64()
                    .or_else(|| existing.as_str().and_then(|text| text.parse().ok()));
                if let Some(explicit) = explicit {
                    store.next_id = store.next_id.max(explicit);
                }
            }
        }
    }
    Ok(record)
}

#[async_trait]
impl Storage for MemoryStore {
    async fn drop_table(&self, table: Option<&str>) -> Result<()> {
        let mut data = self.write("drop")?;
        match table {
            Some(table) => {
                data.remove(table);
            }
            None => data.clear(),
        }
        tracing::debug!(component = module_path!(), op = "drop", table = table.unwrap_or("*"));
        Ok(())
    }

    async fn get(
        &self,
        table: &str,
        query: Query,
        modifier: Option<Modifier>,
    ) -> Result<Vec<Record>> {
        let expr = self.select(table, query)?;
        let data = self.read("get")?;
        let mut found = Vec::new();
        if let Some(store) = data.get(table) {
            for record in &store.records {
                if matches(&expr, record)? {
                    found.push(record.clone());
                }
            }
        }
        Ok(apply_modifier(found, &resolve_modifier(modifier)))
    }

    async fn set(&self, table: &str, query: Query, patch: Record) -> Result<()> {
        let expr = self.select(table, query)?;
        let mut data = self.write("set")?;
        let Some(store) = data.get_mut(table) else {
            return Ok(());
        };
        let mut hits = Vec::new();
        for (index, record) in store.records.iter().enumerate() {
            if matches(&expr, record)? {
                hits.push(index);
            }
        }
        for index in &hits {
            store.records[*index].extend(patch.clone());
        }
        let updated = hits.len();
        tracing::debug!(component = module_path!(), op = "set", table, updated);
        Ok(())
    }

    async fn remove(&self, table: &str, query: Query) -> Result<()> {
        let expr = self.select(table, query)?;
        let mut data = self.write("remove")?;
        let Some(store) = data.get_mut(table) else {
            return Ok(());
        };
        let mut kept = Vec::with_capacity(store.records.len());
        for record in &store.records {
            if !matches(&expr, record)? {
                kept.push(record.clone());
            }
        }
        store.records = kept;
        Ok(())
    }

    async fn create(&self, table: &str, data: Record) -> Result<Record> {
        let config = self.tables.get(table)?;
        let keys = config.primary.fields();
        let mut guard = self.write("create")?;
        let store = guard.entry(table.to_string()).or_default();

        let record = materialize(&self.tables, config, store, data)?;
        if store
            .records
            .iter()
            .any(|existing| same_key(existing, &record, &keys))
        {
            return Err(duplicate_key("create", table, &describe_key(&record, &keys)));
        }
        if let Some(key) = unique_violation(config, &store.records, &record, None) {
            return Err(duplicate_key("create", table, &key));
        }
        store.records.push(record.clone());
        tracing::debug!(component = module_path!(), op = "create", table);
        Ok(record)
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        keys: Option<Vec<String>>,
    ) -> Result<()> {
        let config = self.tables.get(table)?;
        let keys = key_fields(config, keys);
        let mut guard = self.write("upsert")?;
        let store = guard.entry(table.to_string()).or_default();

        // A rejected batch leaves the table untouched
        let mut staged = store.clone();
        for update in records {
            let position = staged
                .records
                .iter()
                .position(|existing| same_key(existing, &update, &keys));
            let index = match position {
                Some(index) => {
                    staged.records[index].extend(update);
                    index
                }
                None => {
                    let record = materialize(&self.tables, config, &mut staged, update)?;
                    staged.records.push(record);
                    staged.records.len() - 1
                }
            };
            if let Some(key) =
                unique_violation(config, &staged.records, &staged.records[index], Some(index))
            {
                return Err(duplicate_key("upsert", table, &key));
            }
        }
        *store = staged;
        Ok(())
    }

    async fn aggregate(
        &self,
        table: &str,
        projection: BTreeMap<String, Eval>,
        query: Query,
    ) -> Result<BTreeMap<String, Value>> {
        let expr = self.select(table, query)?;
        let data = self.read("aggregate")?;
        let mut selected = Vec::new();
        if let Some(store) = data.get(table) {
            for record in &store.records {
                if matches(&expr, record)? {
                    selected.push(record.clone());
                }
            }
        }

        projection
            .into_iter()
            .map(|(name, eval)| {
                if !eval.is_aggregation() {
                    return Err(HeraldError::invalid_expression(format!(
                        "projection {} contains no aggregator",
                        name
                    )));
                }
                aggregate(&eval, &selected).map(|value| (name, value))
            })
            .collect()
    }
}
