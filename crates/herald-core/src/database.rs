//! Storage collaborator
//!
//! Backends implement the six primitive operations; the user and channel
//! helpers are provided on top of them. Every backend must interpret a query
//! after [`resolve`](crate::query::resolve) normalization, which is the
//! canonical form.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::query::{
    Eval, FieldQuery, Modifier, Query, QueryExpr, Record, CHANNEL_TABLE, USER_TABLE,
};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Drop one table, or every table when `table` is `None`
    async fn drop_table(&self, table: Option<&str>) -> Result<()>;

    async fn get(&self, table: &str, query: Query, modifier: Option<Modifier>)
        -> Result<Vec<Record>>;

    /// Merge `patch` into every matching record
    async fn set(&self, table: &str, query: Query, patch: Record) -> Result<()>;

    async fn remove(&self, table: &str, query: Query) -> Result<()>;

    /// Insert a record built from the table's initial values overlaid with
    /// `data`; returns the stored record
    async fn create(&self, table: &str, data: Record) -> Result<Record>;

    /// Insert or merge each record, matched on `keys` (primary key by default)
    async fn upsert(&self, table: &str, records: Vec<Record>, keys: Option<Vec<String>>)
        -> Result<()>;

    /// Evaluate each named aggregation over the matching records
    async fn aggregate(
        &self,
        table: &str,
        projection: BTreeMap<String, Eval>,
        query: Query,
    ) -> Result<BTreeMap<String, Value>>;

    /// Fetch the user bound to `id` on `platform`
    ///
    /// The returned record always carries the `platform` field set to `id`.
    async fn get_user(
        &self,
        platform: &str,
        id: &str,
        modifier: Option<Modifier>,
    ) -> Result<Option<Record>> {
        let query = QueryExpr::new().field(platform, id);
        let mut records = self.get(USER_TABLE, query.into(), modifier).await?;
        if records.is_empty() {
            return Ok(None);
        }
        let mut record = records.swap_remove(0);
        record.insert(platform.to_string(), Value::String(id.to_string()));
        Ok(Some(record))
    }

    async fn get_users(
        &self,
        platform: &str,
        ids: &[String],
        modifier: Option<Modifier>,
    ) -> Result<Vec<Record>> {
        let query = QueryExpr::new().field(platform, ids.to_vec());
        self.get(USER_TABLE, query.into(), modifier).await
    }

    async fn set_user(&self, platform: &str, id: &str, patch: Record) -> Result<()> {
        let query = QueryExpr::new().field(platform, id);
        self.set(USER_TABLE, query.into(), patch).await
    }

    async fn create_user(&self, platform: &str, id: &str, mut data: Record) -> Result<Record> {
        data.insert(platform.to_string(), Value::String(id.to_string()));
        self.create(USER_TABLE, data).await
    }

    /// Fetch a channel by its composite key
    ///
    /// The returned record always carries `platform` and `id`.
    async fn get_channel(
        &self,
        platform: &str,
        id: &str,
        modifier: Option<Modifier>,
    ) -> Result<Option<Record>> {
        let mut records = self
            .get(CHANNEL_TABLE, channel_key(platform, id).into(), modifier)
            .await?;
        if records.is_empty() {
            return Ok(None);
        }
        let mut record = records.swap_remove(0);
        record.insert("platform".to_string(), Value::String(platform.to_string()));
        record.insert("id".to_string(), Value::String(id.to_string()));
        Ok(Some(record))
    }

    async fn set_channel(&self, platform: &str, id: &str, patch: Record) -> Result<()> {
        self.set(CHANNEL_TABLE, channel_key(platform, id).into(), patch)
            .await
    }

    async fn create_channel(&self, platform: &str, id: &str, mut data: Record) -> Result<Record> {
        data.insert("platform".to_string(), Value::String(platform.to_string()));
        data.insert("id".to_string(), Value::String(id.to_string()));
        self.create(CHANNEL_TABLE, data).await
    }

    /// Channels assigned to any of the given bot accounts, keyed by platform
    async fn get_assigned_channels(
        &self,
        assignees: &BTreeMap<String, Vec<String>>,
        fields: Option<Vec<String>>,
    ) -> Result<Vec<Record>> {
        let branches = assignees
            .iter()
            .map(|(platform, ids)| {
                QueryExpr::new()
                    .field("platform", platform.as_str())
                    .field("assignee", FieldQuery::from(ids.clone()))
            })
            .collect();
        let query = QueryExpr::new().or(branches);
        self.get(CHANNEL_TABLE, query.into(), fields.map(Modifier::Fields))
            .await
    }
}

fn channel_key(platform: &str, id: &str) -> QueryExpr {
    QueryExpr::new().field("platform", platform).field("id", id)
}

/// Typed view of a record
///
/// # Errors
///
/// Returns `Serialization` when the record does not fit `T`.
pub fn from_record<T: serde::de::DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Record view of a typed value; non-object values yield an empty record
///
/// # Errors
///
/// Returns `Serialization` when `value` cannot be represented as JSON.
pub fn to_record<T: serde::Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        _ => Ok(Record::new()),
    }
}
