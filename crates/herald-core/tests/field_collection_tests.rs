#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use herald_core::fields::{AUTHORITY, TIMERS, USAGE};
use herald_core::{
    Argv, CommandConfig, CommandRegistry, FieldCollector, FieldTable, OptionDecl, Session,
};
use serde_json::json;

fn argv_for(registry: &CommandRegistry, name: &str) -> Argv {
    Argv::new(Session::new("mock", "alice")).with_command(registry.get(name).unwrap())
}

#[test]
fn test_validation_fields_follow_config() {
    let mut registry = CommandRegistry::new();
    registry
        .register(
            "daily",
            "",
            CommandConfig::default()
                .max_usage(3)
                .min_interval(Duration::from_secs(5)),
        )
        .unwrap();
    registry
        .register("open", "", CommandConfig::default().authority(0))
        .unwrap();

    let daily = registry.collect_fields(&argv_for(&registry, "daily"), FieldTable::User);
    assert!(daily.contains(AUTHORITY));
    assert!(daily.contains(USAGE));
    assert!(daily.contains(TIMERS));

    let open = registry.collect_fields(&argv_for(&registry, "open"), FieldTable::User);
    assert!(open.is_empty());
}

#[test]
fn test_not_usage_option_suppresses_throttling_fields() {
    let mut registry = CommandRegistry::new();
    let id = registry
        .register("daily", "", CommandConfig::default().max_usage(3))
        .unwrap();
    registry
        .option(id, OptionDecl::new("peek", "").not_usage())
        .unwrap();

    let argv = argv_for(&registry, "daily").with_option("peek", json!(true));
    let fields = registry.collect_fields(&argv, FieldTable::User);
    assert!(!fields.contains(USAGE));
    assert!(fields.contains(AUTHORITY));
}

#[test]
fn test_unparsed_options_force_authority_fetch() {
    let mut registry = CommandRegistry::new();
    let id = registry
        .register("open", "", CommandConfig::default().authority(0))
        .unwrap();
    registry
        .option(id, OptionDecl::new("force", "").authority(3))
        .unwrap();

    let parsed = argv_for(&registry, "open");
    assert!(!registry
        .collect_fields(&parsed, FieldTable::User)
        .contains(AUTHORITY));

    let raw = argv_for(&registry, "open").with_tokens(vec!["--force".to_string()]);
    assert!(registry
        .collect_fields(&raw, FieldTable::User)
        .contains(AUTHORITY));
}

#[test]
fn test_command_and_global_collectors_union() {
    let mut registry = CommandRegistry::new();
    let id = registry
        .register("sign", "", CommandConfig::default().authority(0))
        .unwrap();
    registry
        .user_fields(id, FieldCollector::fields(["money"]))
        .unwrap();
    registry.global_channel_fields(FieldCollector::fields(["assignee"]));
    registry
        .channel_fields(
            id,
            FieldCollector::dynamic(|argv, fields| {
                if argv.has_option("here") {
                    fields.insert("disable".to_string());
                }
            }),
        )
        .unwrap();

    let argv = argv_for(&registry, "sign").with_option("here", json!(true));
    let user = registry.collect_fields(&argv, FieldTable::User);
    let channel = registry.collect_fields(&argv, FieldTable::Channel);

    assert_eq!(user.into_iter().collect::<Vec<_>>(), vec!["money".to_string()]);
    assert_eq!(
        channel.into_iter().collect::<Vec<_>>(),
        vec!["assignee".to_string(), "disable".to_string()]
    );
}
