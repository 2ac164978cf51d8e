//! Session collaborator: the invoking identity, its records and a reply channel
//!
//! User and channel records are shared (`Arc<Mutex<_>>`) between the session,
//! policy middleware and actions. Policy middleware mutates the `usage` and
//! `timers` sub-records in place; persisting them is the engine's job.
//! Locks are never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use herald_core_types::Correlation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared, lock-protected record
pub type Shared<T> = Arc<Mutex<T>>;

/// Lock a shared record, recovering the data if a previous holder panicked
pub fn lock<T>(record: &Mutex<T>) -> MutexGuard<'_, T> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-day usage counters keyed by throttling bucket
///
/// `$date` is the day number the counts belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMap {
    #[serde(rename = "$date", default)]
    pub date: i64,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl UsageMap {
    pub fn for_day(date: i64) -> Self {
        Self {
            date,
            counts: BTreeMap::new(),
        }
    }
}

/// Re-invocation timers keyed by throttling bucket
///
/// Values are absolute expiry instants in epoch milliseconds; `$date` is the
/// next sweep deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerMap {
    #[serde(rename = "$date", default)]
    pub date: i64,
    #[serde(flatten)]
    pub expiries: BTreeMap<String, i64>,
}

/// User record as fetched from storage
///
/// Every field is optional because only the fields requested by the field
/// collectors are fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timers: Option<TimerMap>,
    /// Platform account ids and extension-defined fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    pub fn with_authority(authority: u32) -> Self {
        Self {
            authority: Some(authority),
            ..Self::default()
        }
    }
}

/// Channel record as fetched from storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Outbound message capability supplied by the platform adapter
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, session: &Session, text: &str) -> anyhow::Result<()>;
}

/// The conversational session an invocation originates from
#[derive(Clone)]
pub struct Session {
    pub platform: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub user: Option<Shared<User>>,
    pub channel: Option<Shared<Channel>>,
    pub correlation: Correlation,
    transport: Option<Arc<dyn Transport>>,
}

impl Session {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
            channel_id: None,
            user: None,
            channel: None,
            correlation: Correlation::new(),
            transport: None,
        }
    }

    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(Arc::new(Mutex::new(user)));
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(Arc::new(Mutex::new(channel)));
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Adopt the adapter's correlation instead of the generated one
    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    /// Authority of the loaded user, if the field was fetched
    pub fn authority(&self) -> Option<u32> {
        self.user.as_ref().and_then(|user| lock(user).authority)
    }

    /// Snapshot of the loaded user record
    pub fn user_snapshot(&self) -> Option<User> {
        self.user.as_ref().map(|user| lock(user).clone())
    }

    /// Send a message back through the adapter; a no-op without a transport
    ///
    /// # Errors
    ///
    /// Propagates the transport's delivery error.
    pub async fn send(&self, text: &str) -> anyhow::Result<()> {
        match &self.transport {
            Some(transport) => transport.send(self, text).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("platform", &self.platform)
            .field("user_id", &self.user_id)
            .field("channel_id", &self.channel_id)
            .field("invocation_id", &self.correlation.invocation_id)
            .finish()
    }
}
