//! Error helpers for herald-store
//!
//! Storage failures surface as `HeraldError::Storage` so callers see one
//! error type regardless of backend.

use herald_core::errors::HeraldError;

/// Result type alias shared with the Storage trait
pub type Result<T> = herald_core::errors::Result<T>;

/// A table's lock was poisoned by a panicking writer
pub fn poisoned(op: &str) -> HeraldError {
    HeraldError::Storage {
        op: op.to_string(),
        message: "table lock poisoned".to_string(),
    }
}

/// A record with the same primary key or unique group already exists
pub fn duplicate_key(op: &str, table: &str, key: &str) -> HeraldError {
    HeraldError::Storage {
        op: op.to_string(),
        message: format!("duplicate key {} in table {}", key, table),
    }
}
