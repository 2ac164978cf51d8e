use herald_core::query::Record;
use herald_store::MemoryStore;
use serde_json::Value;

/// Store with the default `user` and `channel` tables
#[allow(dead_code)]
pub fn new_store() -> MemoryStore {
    MemoryStore::default()
}

/// Record from a JSON object literal
#[allow(dead_code)]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
