//! Field collector protocol
//!
//! Before policy checks run, every collector registered for a table is asked
//! which record fields the upcoming checks will read. The resulting set is
//! what the storage collaborator is asked to populate; collectors have no
//! other effect.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::argv::Argv;
use crate::computed::Computed;

pub const AUTHORITY: &str = "authority";
pub const USAGE: &str = "usage";
pub const TIMERS: &str = "timers";

/// Record table a collector contributes fields for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTable {
    User,
    Channel,
}

type CollectFn = dyn Fn(&Argv, &mut BTreeSet<String>) + Send + Sync;

/// A field declaration: a fixed list or a callback inspecting the invocation
#[derive(Clone)]
pub enum FieldCollector {
    Fields(Vec<String>),
    Dynamic(Arc<CollectFn>),
}

impl FieldCollector {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldCollector::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Argv, &mut BTreeSet<String>) + Send + Sync + 'static,
    {
        FieldCollector::Dynamic(Arc::new(f))
    }

    pub fn collect(&self, argv: &Argv, fields: &mut BTreeSet<String>) {
        match self {
            FieldCollector::Fields(list) => fields.extend(list.iter().cloned()),
            FieldCollector::Dynamic(f) => f(argv, fields),
        }
    }
}

impl fmt::Debug for FieldCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldCollector::Fields(list) => f.debug_tuple("Fields").field(list).finish(),
            FieldCollector::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

/// Fields the authority and throttling checks will read for `argv`
///
/// Authority is needed when the command or any passed option requires more
/// than zero; usage only when the daily limit is finite; timers only when an
/// interval is set. A passed `not_usage` option suppresses both throttling
/// fields. Session-computed values are assumed to need their field.
pub fn validation_fields(argv: &Argv, fields: &mut BTreeSet<String>) {
    let Some(command) = &argv.command else {
        return;
    };
    let config = &command.config;

    let mut fetch_authority = match &config.authority {
        Computed::Literal(authority) => *authority > 0,
        Computed::Computed(_) => true,
    };
    let mut fetch_throttling = true;

    for option in &command.options {
        if argv.options.contains_key(&option.name) {
            if option.authority > 0 {
                fetch_authority = true;
            }
            if option.not_usage {
                fetch_throttling = false;
            }
        } else if argv.tokens.is_some() && option.authority > 0 {
            fetch_authority = true;
        }
    }

    if fetch_authority {
        fields.insert(AUTHORITY.to_string());
    }
    if fetch_throttling {
        let limited = match &config.max_usage {
            Computed::Literal(max) => max.is_some(),
            Computed::Computed(_) => true,
        };
        let timed = match &config.min_interval {
            Computed::Literal(interval) => !interval.is_zero(),
            Computed::Computed(_) => true,
        };
        if limited {
            fields.insert(USAGE.to_string());
        }
        if timed {
            fields.insert(TIMERS.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandConfig, CommandRegistry, OptionDecl};
    use crate::session::Session;
    use serde_json::json;
    use std::time::Duration;

    fn collect(registry: &CommandRegistry, argv: &Argv) -> BTreeSet<String> {
        registry.collect_fields(argv, FieldTable::User)
    }

    fn argv_for(registry: &CommandRegistry, name: &str) -> Argv {
        let command = registry.get(name).unwrap();
        Argv::new(Session::new("mock", "1")).with_command(command)
    }

    #[test]
    fn test_unthrottled_command_needs_authority_only() {
        let mut registry = CommandRegistry::new();
        registry.register("echo", "", CommandConfig::default()).unwrap();

        let fields = collect(&registry, &argv_for(&registry, "echo"));
        assert_eq!(fields, BTreeSet::from([AUTHORITY.to_string()]));
    }

    #[test]
    fn test_public_command_fetches_nothing() {
        let mut registry = CommandRegistry::new();
        registry
            .register("help", "", CommandConfig::default().authority(0))
            .unwrap();

        assert!(collect(&registry, &argv_for(&registry, "help")).is_empty());
    }

    #[test]
    fn test_throttled_command_needs_usage_and_timers() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                "roll",
                "",
                CommandConfig::default()
                    .authority(0)
                    .max_usage(3)
                    .min_interval(Duration::from_secs(5)),
            )
            .unwrap();

        let fields = collect(&registry, &argv_for(&registry, "roll"));
        assert!(fields.contains(USAGE));
        assert!(fields.contains(TIMERS));
        assert!(!fields.contains(AUTHORITY));
    }

    #[test]
    fn test_not_usage_option_suppresses_throttling_fields() {
        let mut registry = CommandRegistry::new();
        let id = registry
            .register("roll", "", CommandConfig::default().authority(0).max_usage(3))
            .unwrap();
        registry
            .option(id, OptionDecl::new("dry", "").not_usage().authority(2))
            .unwrap();

        let argv = argv_for(&registry, "roll").with_option("dry", json!(true));
        let fields = collect(&registry, &argv);
        assert!(!fields.contains(USAGE));
        assert!(fields.contains(AUTHORITY));
    }

    #[test]
    fn test_command_collectors_extend_set() {
        let mut registry = CommandRegistry::new();
        let id = registry
            .register("profile", "", CommandConfig::default().authority(0))
            .unwrap();
        registry
            .user_fields(id, FieldCollector::fields(["name"]))
            .unwrap();
        registry.global_user_fields(FieldCollector::dynamic(|argv, fields| {
            if argv.options.contains_key("verbose") {
                fields.insert("flag".to_string());
            }
        }));

        let argv = argv_for(&registry, "profile").with_option("verbose", json!(true));
        let fields = collect(&registry, &argv);
        assert_eq!(
            fields,
            BTreeSet::from(["flag".to_string(), "name".to_string()])
        );
    }
}
