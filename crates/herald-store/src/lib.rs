//! Herald Store - reference storage for the Herald runtime
//!
//! Provides:
//! - `exec`: the reference interpreter for queries, modifiers and
//!   aggregation expressions over JSON records
//! - `MemoryStore`: an in-process Storage collaborator built on it

pub mod errors;
pub mod exec;
pub mod memory;

pub use errors::Result;
pub use memory::MemoryStore;
