//! Built-in validation checkers
//!
//! [`AuthorityUsageChecker`] enforces authority thresholds and throttling;
//! [`ArgvShapeChecker`] enforces declared argument counts and options. Both
//! are installed as `before_command` hooks.

use std::sync::Arc;

use async_trait::async_trait;
use herald_core_types::schema::EVENT_VETO;

use crate::argv::Argv;
use crate::command::Command;
use crate::dispatch::Checker;
use crate::errors::ExErrorKind;
use crate::policy::throttle::{check_timer, check_usage, date_number};
use crate::policy::PolicyEnv;
use crate::session::{lock, TimerMap, UsageMap};
use crate::template::{
    INSUFFICIENT_ARGUMENTS, LOW_AUTHORITY, REDUNDANT_ARGUMENTS, TOO_FREQUENT, UNKNOWN_OPTION,
    USAGE_EXHAUSTED,
};

fn hint(
    env: &PolicyEnv,
    argv: &Argv,
    command: &Command,
    key: &str,
    params: &[String],
) -> Option<String> {
    tracing::debug!(
        component = module_path!(),
        op = "validate",
        event = EVENT_VETO,
        err.code = ExErrorKind::PolicyDenied.code(),
        invocation_id = %argv.session.correlation.invocation_id,
        command = %command.name,
        hint = key,
    );
    if command.config.show_warning {
        Some(env.templates.format(key, params))
    } else {
        Some(String::new())
    }
}

/// Authority, daily usage and re-invocation interval checks
///
/// Skipped entirely when the session has no user record. Authority is only
/// compared when the record carries it. Usage and interval accounting is
/// skipped when any passed option is declared `not_usage`.
pub struct AuthorityUsageChecker {
    env: Arc<PolicyEnv>,
}

impl AuthorityUsageChecker {
    pub fn new(env: Arc<PolicyEnv>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Checker for AuthorityUsageChecker {
    async fn check(&self, argv: &mut Argv) -> anyhow::Result<Option<String>> {
        let Some(command) = argv.command.clone() else {
            return Ok(None);
        };
        let Some(user) = argv.session.user.clone() else {
            return Ok(None);
        };

        let session = &argv.session;
        let required = command.config.authority.resolve(session);
        let max_usage = command.config.max_usage.resolve(session);
        let min_interval = command.config.min_interval.resolve(session);

        let mut user = lock(&user);

        if let Some(authority) = user.authority {
            if required > authority {
                return Ok(hint(&self.env, argv, &command, LOW_AUTHORITY, &[]));
            }
        }

        let mut counts_usage = true;
        for option in &command.options {
            if !argv.options.contains_key(&option.name) {
                continue;
            }
            if user.authority.is_some_and(|authority| option.authority > authority) {
                return Ok(hint(&self.env, argv, &command, LOW_AUTHORITY, &[]));
            }
            if option.not_usage {
                counts_usage = false;
            }
        }

        if !counts_usage {
            return Ok(None);
        }

        let bucket = command.usage_name();
        let now = self.env.clock.now();

        if let Some(max_usage) = max_usage {
            let today = date_number(now, self.env.utc_offset_minutes);
            let usage = user.usage.get_or_insert_with(|| UsageMap::for_day(today));
            if check_usage(bucket, usage, max_usage, today) {
                return Ok(hint(&self.env, argv, &command, USAGE_EXHAUSTED, &[]));
            }
        }

        if !min_interval.is_zero() {
            let timers = user.timers.get_or_insert_with(TimerMap::default);
            if check_timer(bucket, timers, Some(min_interval), now.timestamp_millis()) {
                return Ok(hint(&self.env, argv, &command, TOO_FREQUENT, &[]));
            }
        }

        Ok(None)
    }
}

/// Positional-argument count and unknown-option checks, opt-in per command
pub struct ArgvShapeChecker {
    env: Arc<PolicyEnv>,
}

impl ArgvShapeChecker {
    pub fn new(env: Arc<PolicyEnv>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Checker for ArgvShapeChecker {
    async fn check(&self, argv: &mut Argv) -> anyhow::Result<Option<String>> {
        let Some(command) = argv.command.clone() else {
            return Ok(None);
        };

        if command.config.check_arg_count {
            let given = argv.args.len();
            if command.arguments.get(given).is_some_and(|next| next.required) {
                return Ok(hint(&self.env, argv, &command, INSUFFICIENT_ARGUMENTS, &[]));
            }
            let absorbs_rest = command
                .arguments
                .last()
                .is_some_and(|last| last.absorbs_rest());
            if given > command.arguments.len() && !absorbs_rest {
                return Ok(hint(&self.env, argv, &command, REDUNDANT_ARGUMENTS, &[]));
            }
        }

        if command.config.check_unknown {
            let unknown: Vec<&str> = argv
                .options
                .keys()
                .filter(|key| command.option(key).is_none())
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Ok(hint(&self.env, argv, &command, UNKNOWN_OPTION, &[unknown.join(", ")]));
            }
        }

        Ok(None)
    }
}
