//! Herald Core - command dispatch kernel
//!
//! This crate provides the invocation core of the Herald bot runtime:
//! - Command registry with hierarchical commands, aliases, options and shortcuts
//! - Argv invocation context
//! - Dispatch pipeline: checkers, then a continuation-chained action list
//! - Policy middleware for authority, daily usage, re-invocation interval and
//!   argument/option shape
//! - Field collector protocol deciding which user/channel fields to fetch
//! - Query, modifier and aggregation model plus the Storage collaborator trait

pub mod argv;
pub mod command;
pub mod computed;
pub mod database;
pub mod dispatch;
pub mod errors;
pub mod fields;
pub mod logging_facility;
pub mod policy;
pub mod query;
pub mod session;
pub mod template;

// Re-export commonly used types
pub use argv::Argv;
pub use command::{
    Command, CommandConfig, CommandId, CommandRegistry, Disposable, ExtensionScope, OptionDecl,
    RegistryEvent, ShortcutConfig,
};
pub use computed::Computed;
pub use database::Storage;
pub use dispatch::{action_fn, checker_fn, Action, ActionResult, Checker, Dispatch, Next};
pub use errors::{ExError, ExErrorKind, HeraldError, Result};
pub use fields::{FieldCollector, FieldTable};
pub use policy::{Clock, FixedClock, PolicyEnv, SystemClock};
pub use session::{Channel, Session, Transport, User};
pub use template::{TemplateRegistry, Templates};

// Log schema and correlation ids, so dependents need not name herald-core-types
pub use herald_core_types::schema;
pub use herald_core_types::{Correlation, InvocationId, TraceId};
