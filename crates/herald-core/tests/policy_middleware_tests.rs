#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{argv, noon, policy_registry, run, session_with_authority};
use herald_core::dispatch::action_fn;
use herald_core::policy::DAY_MS;
use herald_core::{CommandConfig, CommandId, CommandRegistry, Computed, OptionDecl, Session};
use serde_json::json;

fn echo(registry: &mut CommandRegistry, template: &str, config: CommandConfig) -> CommandId {
    let id = registry.register(template, "echo", config).unwrap();
    registry
        .action(
            id,
            action_fn(|argv, _next| async move { Ok(Some(format!("ok {}", argv.args.len()))) }),
            false,
        )
        .unwrap();
    id
}

#[tokio::test]
async fn test_usage_exhaustion_and_next_day_reset() {
    let (mut registry, clock) = policy_registry();
    echo(&mut registry, "echo", CommandConfig::default().max_usage(2));
    let session = session_with_authority(1);

    assert_eq!(run(&registry, argv(&session, "echo", &[])).await.unwrap(), "ok 0");
    assert_eq!(run(&registry, argv(&session, "echo", &[])).await.unwrap(), "ok 0");
    assert_eq!(
        run(&registry, argv(&session, "echo", &[])).await.unwrap(),
        "Daily usage limit reached."
    );

    let usage = session.user_snapshot().unwrap().usage.unwrap();
    assert_eq!(usage.counts.get("echo"), Some(&2));

    clock.advance(Duration::from_millis(DAY_MS as u64));
    assert_eq!(run(&registry, argv(&session, "echo", &[])).await.unwrap(), "ok 0");
    let usage = session.user_snapshot().unwrap().usage.unwrap();
    assert_eq!(usage.counts.get("echo"), Some(&1));
}

#[tokio::test]
async fn test_shared_usage_bucket() {
    let (mut registry, _clock) = policy_registry();
    echo(&mut registry, "draw", CommandConfig::default().max_usage(1).usage_name("gacha"));
    echo(&mut registry, "pull", CommandConfig::default().max_usage(1).usage_name("gacha"));
    let session = session_with_authority(1);

    assert_eq!(run(&registry, argv(&session, "draw", &[])).await.unwrap(), "ok 0");
    assert_eq!(
        run(&registry, argv(&session, "pull", &[])).await.unwrap(),
        "Daily usage limit reached."
    );
}

#[tokio::test]
async fn test_min_interval() {
    let (mut registry, clock) = policy_registry();
    echo(
        &mut registry,
        "ping",
        CommandConfig::default().min_interval(Duration::from_secs(60)),
    );
    let session = session_with_authority(1);

    assert_eq!(run(&registry, argv(&session, "ping", &[])).await.unwrap(), "ok 0");
    clock.advance(Duration::from_secs(30));
    assert_eq!(
        run(&registry, argv(&session, "ping", &[])).await.unwrap(),
        "Called too frequently, please wait."
    );
    clock.advance(Duration::from_secs(31));
    assert_eq!(run(&registry, argv(&session, "ping", &[])).await.unwrap(), "ok 0");
}

#[tokio::test]
async fn test_not_usage_option_skips_throttling() {
    let (mut registry, _clock) = policy_registry();
    let id = echo(&mut registry, "status", CommandConfig::default().max_usage(1));
    registry
        .option(id, OptionDecl::new("dry", "do not count").not_usage())
        .unwrap();
    let session = session_with_authority(1);

    assert_eq!(run(&registry, argv(&session, "status", &[])).await.unwrap(), "ok 0");
    let dry = argv(&session, "status", &[]).with_option("dry", json!(true));
    assert_eq!(run(&registry, dry).await.unwrap(), "ok 0");
    assert_eq!(
        run(&registry, argv(&session, "status", &[])).await.unwrap(),
        "Daily usage limit reached."
    );
}

#[tokio::test]
async fn test_authority_threshold() {
    let (mut registry, _clock) = policy_registry();
    echo(&mut registry, "ban", CommandConfig::default().authority(3));

    let low = session_with_authority(2);
    assert_eq!(
        run(&registry, argv(&low, "ban", &[])).await.unwrap(),
        "Insufficient authority."
    );

    let high = session_with_authority(3);
    assert_eq!(run(&registry, argv(&high, "ban", &[])).await.unwrap(), "ok 0");
}

#[tokio::test]
async fn test_computed_authority_resolves_per_session() {
    let (mut registry, _clock) = policy_registry();
    let threshold: Computed<u32> = Computed::computed(|session: &Session| {
        if session.platform == "mock" {
            4
        } else {
            1
        }
    });
    echo(&mut registry, "kick", CommandConfig::default().authority(threshold));

    let session = session_with_authority(2);
    assert_eq!(
        run(&registry, argv(&session, "kick", &[])).await.unwrap(),
        "Insufficient authority."
    );
}

#[tokio::test]
async fn test_option_authority() {
    let (mut registry, _clock) = policy_registry();
    let id = echo(&mut registry, "say", CommandConfig::default());
    registry
        .option(id, OptionDecl::new("everyone", "broadcast").authority(4))
        .unwrap();
    let session = session_with_authority(1);

    let broadcast = argv(&session, "say", &[]).with_option("everyone", json!(true));
    assert_eq!(run(&registry, broadcast).await.unwrap(), "Insufficient authority.");
    assert_eq!(run(&registry, argv(&session, "say", &[])).await.unwrap(), "ok 0");
}

#[tokio::test]
async fn test_no_user_skips_authority_and_usage() {
    let (mut registry, _clock) = policy_registry();
    echo(&mut registry, "ban", CommandConfig::default().authority(5).max_usage(0));
    let anonymous = Session::new("mock", "nobody");

    assert_eq!(run(&registry, argv(&anonymous, "ban", &[])).await.unwrap(), "ok 0");
}

#[tokio::test]
async fn test_argument_count() {
    let (mut registry, _clock) = policy_registry();
    echo(
        &mut registry,
        "greet <name>",
        CommandConfig::default().check_arg_count(true),
    );
    let session = session_with_authority(1);

    assert_eq!(
        run(&registry, argv(&session, "greet", &[])).await.unwrap(),
        "Insufficient arguments."
    );
    assert_eq!(
        run(&registry, argv(&session, "greet", &["bob"])).await.unwrap(),
        "ok 1"
    );
    assert_eq!(
        run(&registry, argv(&session, "greet", &["bob", "carol"])).await.unwrap(),
        "Redundant arguments."
    );
}

#[tokio::test]
async fn test_text_argument_absorbs_rest() {
    let (mut registry, _clock) = policy_registry();
    echo(
        &mut registry,
        "say <message:text>",
        CommandConfig::default().check_arg_count(true),
    );
    let session = session_with_authority(1);

    assert_eq!(
        run(&registry, argv(&session, "say", &["a", "b", "c"])).await.unwrap(),
        "ok 3"
    );
}

#[tokio::test]
async fn test_unknown_options_listed_together() {
    let (mut registry, _clock) = policy_registry();
    let id = echo(&mut registry, "roll", CommandConfig::default().check_unknown(true));
    registry.option(id, OptionDecl::new("sides", "die size")).unwrap();
    let session = session_with_authority(1);

    let call = argv(&session, "roll", &[])
        .with_option("sides", json!(6))
        .with_option("alpha", json!(true))
        .with_option("beta", json!(true));
    assert_eq!(
        run(&registry, call).await.unwrap(),
        "Unknown options: alpha, beta."
    );

    let known = argv(&session, "roll", &[]).with_option("sides", json!(6));
    assert_eq!(run(&registry, known).await.unwrap(), "ok 0");
}

#[tokio::test]
async fn test_silent_veto_without_warning() {
    let (mut registry, _clock) = policy_registry();
    echo(
        &mut registry,
        "secret",
        CommandConfig::default().authority(9).show_warning(false),
    );
    let session = session_with_authority(1);

    assert_eq!(run(&registry, argv(&session, "secret", &[])).await.unwrap(), "");
}

#[tokio::test]
async fn test_usage_keeps_date_stamp() {
    let (mut registry, _clock) = policy_registry();
    echo(&mut registry, "echo", CommandConfig::default().max_usage(5));
    let session = session_with_authority(1);

    run(&registry, argv(&session, "echo", &[])).await.unwrap();
    let usage = session.user_snapshot().unwrap().usage.unwrap();
    assert_eq!(usage.date, noon().timestamp_millis().div_euclid(DAY_MS));
}
