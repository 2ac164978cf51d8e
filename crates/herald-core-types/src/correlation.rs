//! Correlation types for invocation tracking
//!
//! Every resolved invocation carries an `InvocationId`; adapters that already
//! participate in a distributed trace may attach a `TraceId` as well.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single command invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(String);

impl InvocationId {
    /// Generate a new time-ordered InvocationId (UUIDv7)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (adapter-supplied ids)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace identifier propagated from the platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation data attached to one invocation for log and error context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub invocation_id: InvocationId,
    pub trace_id: Option<TraceId>,
}

impl Correlation {
    /// Create a correlation with a fresh InvocationId
    pub fn new() -> Self {
        Self {
            invocation_id: InvocationId::new(),
            trace_id: None,
        }
    }

    /// Attach the adapter's TraceId
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}
