//! Invocation orchestration with boundary logging
//!
//! [`Runtime::handle`] drives one invocation end to end:
//! 1. Resolve the command by name or alias
//! 2. Ask the field collectors which user and channel fields are needed
//! 3. Fetch those records, creating them on first contact
//! 4. Prepare and execute the dispatch
//! 5. Write changed `usage` / `timers` back to storage
//!
//! ## Logging Ownership
//!
//! The engine owns lifecycle logging for invocations (`log_op_start!`,
//! `log_op_end!`, `log_op_error!`). Core and store only emit `debug` details,
//! except the core's `warn` for suppressed mid-chain faults.
//!
//! Every lifecycle event carries the invocation id, and a failed invocation
//! returns its error with an [`ExError`] context holding the same id.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use herald_core::database::from_record;
use herald_core::errors::{ExError, ExErrorKind, HeraldError};
use herald_core::fields::{TIMERS, USAGE};
use herald_core::policy::{self, PolicyEnv};
use herald_core::query::{Modifier, Record};
use herald_core::{
    log_op_end, log_op_error, log_op_start, Argv, Channel, CommandRegistry, Correlation,
    FieldTable, Session, Storage, Transport, User,
};
use serde_json::Value;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::RuntimeConfig;

/// One message addressed to a command, as handed over by a platform adapter
#[derive(Clone, Default)]
pub struct Invocation {
    /// Platform name; the configured default when absent
    pub platform: Option<String>,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub name: String,
    pub args: Vec<Value>,
    pub options: BTreeMap<String, Value>,
    pub error: Option<String>,
    pub tokens: Option<Vec<String>>,
    pub source: Option<String>,
    pub transport: Option<Arc<dyn Transport>>,
    /// Adapter-supplied ids; a fresh invocation id when absent
    pub correlation: Option<Correlation>,
}

impl Invocation {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<String>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = Some(correlation);
        self
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("platform", &self.platform)
            .field("user_id", &self.user_id)
            .field("channel_id", &self.channel_id)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("options", &self.options)
            .field("correlation", &self.correlation)
            .finish()
    }
}

/// Command registry bound to a storage backend and policy environment
pub struct Runtime {
    registry: RwLock<CommandRegistry>,
    storage: Arc<dyn Storage>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Runtime on the system clock with the default reply templates
    pub fn new(storage: Arc<dyn Storage>, config: RuntimeConfig) -> Self {
        Self::with_env(storage, PolicyEnv::default(), config)
    }

    /// Runtime with explicit policy collaborators
    ///
    /// The configured day-boundary offset replaces the one in `env`.
    pub fn with_env(storage: Arc<dyn Storage>, env: PolicyEnv, config: RuntimeConfig) -> Self {
        let env = Arc::new(env.with_utc_offset(config.utc_offset_minutes));
        let mut registry = CommandRegistry::new();
        policy::install(&mut registry, env);
        Self {
            registry: RwLock::new(registry),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn registry(&self) -> RwLockReadGuard<'_, CommandRegistry> {
        self.registry.read().await
    }

    /// Exclusive access for registration; in-flight dispatches keep their
    /// own handler snapshots
    pub async fn registry_mut(&self) -> RwLockWriteGuard<'_, CommandRegistry> {
        self.registry.write().await
    }

    /// Apply the configured `[commands.*]` overrides
    ///
    /// # Errors
    ///
    /// Returns `Config` when an override names an unregistered command.
    pub async fn apply_config(&self) -> herald_core::Result<usize> {
        let mut registry = self.registry.write().await;
        self.config.apply_to(&mut registry)
    }

    /// Run one invocation
    ///
    /// Returns `None` when no command answers to `invocation.name`, otherwise
    /// the reply (empty when there is nothing to say).
    ///
    /// # Errors
    ///
    /// Storage failures, checker errors and faults raised by the terminal
    /// continuation. Throttling state is persisted before a fault is returned.
    /// The error carries an [`ExError`] context naming the command and the
    /// invocation id.
    pub async fn handle(&self, mut invocation: Invocation) -> anyhow::Result<Option<String>> {
        let command = invocation.name.clone();
        let correlation = invocation.correlation.take().unwrap_or_default();
        let invocation_id = correlation.invocation_id.clone();
        log_op_start!(
            "handle",
            invocation_id = %invocation_id,
            command = %command,
            user = %invocation.user_id
        );
        let start = std::time::Instant::now();

        let trace_id = correlation.trace_id.clone();
        match self.handle_impl(invocation, correlation).await {
            Ok(reply) => {
                log_op_end!(
                    "handle",
                    duration_ms = start.elapsed().as_millis() as u64,
                    invocation_id = %invocation_id,
                    command = %command,
                    matched = reply.is_some()
                );
                Ok(reply)
            }
            Err(err) => {
                let mut ex = classify(&err)
                    .with_command(command.clone())
                    .with_invocation_id(invocation_id.clone());
                if let Some(trace_id) = trace_id {
                    ex = ex.with_trace_id(trace_id);
                }
                log_op_error!(
                    "handle",
                    ex.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    invocation_id = %invocation_id,
                    error = %format!("{:#}", err)
                );
                Err(err.context(ex))
            }
        }
    }

    async fn handle_impl(
        &self,
        invocation: Invocation,
        correlation: Correlation,
    ) -> anyhow::Result<Option<String>> {
        let platform = invocation
            .platform
            .clone()
            .unwrap_or_else(|| self.config.platform.clone());

        let mut session = Session::new(platform.as_str(), invocation.user_id.as_str())
            .with_correlation(correlation);
        if let Some(channel_id) = &invocation.channel_id {
            session = session.with_channel_id(channel_id.as_str());
        }
        if let Some(transport) = invocation.transport.clone() {
            session = session.with_transport(transport);
        }

        let Some(mut argv) = self.resolve_argv(session, invocation).await else {
            return Ok(None);
        };

        let (user_fields, channel_fields) = {
            let registry = self.registry.read().await;
            (
                registry.collect_fields(&argv, FieldTable::User),
                registry.collect_fields(&argv, FieldTable::Channel),
            )
        };

        let mut session = argv.session.clone();
        if !user_fields.is_empty() {
            let user = self.load_user(&platform, &session.user_id, &user_fields).await?;
            session = session.with_user(user);
        }
        if let Some(channel_id) = session.channel_id.clone() {
            if !channel_fields.is_empty() {
                let channel = self.load_channel(&platform, &channel_id, &channel_fields).await?;
                session = session.with_channel(channel);
            }
        }
        argv.session = session.clone();
        let before = session.user_snapshot();

        let dispatch = self.registry.read().await.prepare(argv)?;
        let outcome = dispatch.execute(None).await;

        if let (Some(before), Some(after)) = (before, session.user_snapshot()) {
            self.persist_throttling(&platform, &session.user_id, &before, &after)
                .await?;
        }

        outcome.map(Some)
    }

    async fn resolve_argv(&self, session: Session, invocation: Invocation) -> Option<Argv> {
        let command = self.registry.read().await.get(&invocation.name)?;
        let mut argv = Argv::new(session)
            .with_command(command)
            .with_name(invocation.name)
            .with_args(invocation.args);
        argv.options = invocation.options;
        argv.error = invocation.error;
        argv.tokens = invocation.tokens;
        if let Some(source) = invocation.source {
            argv = argv.with_source(source);
        }
        Some(argv)
    }

    async fn load_user(
        &self,
        platform: &str,
        user_id: &str,
        fields: &BTreeSet<String>,
    ) -> herald_core::Result<User> {
        let modifier: Modifier = fields.iter().cloned().chain(["id".to_string()]).collect();
        let record = match self.storage.get_user(platform, user_id, Some(modifier)).await? {
            Some(record) => record,
            None => {
                let mut data = Record::new();
                data.insert(
                    "authority".to_string(),
                    Value::from(self.config.auto_authorize),
                );
                let created = self.storage.create_user(platform, user_id, data).await?;
                tracing::debug!(component = module_path!(), op = "create_user", platform, user_id);
                project(created, fields, &["id", platform])
            }
        };
        from_record(record)
    }

    async fn load_channel(
        &self,
        platform: &str,
        channel_id: &str,
        fields: &BTreeSet<String>,
    ) -> herald_core::Result<Channel> {
        let modifier: Modifier = fields
            .iter()
            .cloned()
            .chain(["id".to_string(), "platform".to_string()])
            .collect();
        let record = match self
            .storage
            .get_channel(platform, channel_id, Some(modifier))
            .await?
        {
            Some(record) => record,
            None => {
                let created = self
                    .storage
                    .create_channel(platform, channel_id, Record::new())
                    .await?;
                tracing::debug!(component = module_path!(), op = "create_channel", platform, channel_id);
                project(created, fields, &["id", "platform"])
            }
        };
        from_record(record)
    }

    /// Write back the throttling sub-records the checkers touched
    async fn persist_throttling(
        &self,
        platform: &str,
        user_id: &str,
        before: &User,
        after: &User,
    ) -> herald_core::Result<()> {
        let mut patch = Record::new();
        if after.usage != before.usage {
            if let Some(usage) = &after.usage {
                patch.insert(USAGE.to_string(), serde_json::to_value(usage)?);
            }
        }
        if after.timers != before.timers {
            if let Some(timers) = &after.timers {
                patch.insert(TIMERS.to_string(), serde_json::to_value(timers)?);
            }
        }
        if patch.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            component = module_path!(),
            op = "persist_throttling",
            platform,
            user_id,
            fields = patch.len()
        );
        self.storage.set_user(platform, user_id, patch).await
    }
}

/// Keep only `fields` plus the key fields of a freshly created record
fn project(record: Record, fields: &BTreeSet<String>, keys: &[&str]) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| fields.contains(key) || keys.contains(&key.as_str()))
        .collect()
}

/// Structured error for a failed invocation
fn classify(err: &anyhow::Error) -> ExError {
    match err.downcast_ref::<HeraldError>() {
        Some(herald) => herald.clone().into(),
        None => ExError::new(ExErrorKind::HandlerFault).with_message(format!("{:#}", err)),
    }
}

/// Current user record for `user_id` as a typed value
///
/// # Errors
///
/// Propagates storage and decoding failures.
pub async fn fetch_user(
    storage: &dyn Storage,
    platform: &str,
    user_id: &str,
) -> herald_core::Result<Option<User>> {
    match storage.get_user(platform, user_id, None).await? {
        Some(record) => from_record(record).map(Some),
        None => Ok(None),
    }
}
