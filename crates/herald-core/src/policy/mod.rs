//! Policy middleware: authority, throttling and argument-shape checks
//!
//! [`install`] registers the built-in checkers as `before_command` hooks on a
//! registry. Throttling state lives on the user record and is mutated in
//! place; see [`throttle`] for the counter and timer rules.

pub mod throttle;
pub mod validate;

use std::sync::Arc;

use crate::command::{CommandRegistry, Disposable};
use crate::template::{TemplateRegistry, Templates};

pub use throttle::{check_timer, check_usage, date_number, get_usage, Clock, FixedClock, SystemClock, DAY_MS};
pub use validate::{ArgvShapeChecker, AuthorityUsageChecker};

/// Collaborators shared by the built-in checkers
pub struct PolicyEnv {
    pub clock: Arc<dyn Clock>,
    pub templates: Arc<dyn Templates>,
    /// Offset of the day boundary from UTC, in minutes east
    pub utc_offset_minutes: i32,
}

impl PolicyEnv {
    pub fn new(clock: Arc<dyn Clock>, templates: Arc<dyn Templates>) -> Self {
        Self {
            clock,
            templates,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

impl Default for PolicyEnv {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(TemplateRegistry::with_defaults()),
        )
    }
}

/// Install the authority/usage checker, then the argument-shape checker
///
/// Returns the hook tokens so the installation can be revoked.
pub fn install(registry: &mut CommandRegistry, env: Arc<PolicyEnv>) -> Vec<Disposable> {
    vec![
        registry.before_command(AuthorityUsageChecker::new(Arc::clone(&env))),
        registry.before_command(ArgvShapeChecker::new(env)),
    ]
}
