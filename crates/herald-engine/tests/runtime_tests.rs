#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{echo, runtime, PLATFORM};
use herald_core::dispatch::action_fn;
use herald_core::errors::{ExError, ExErrorKind};
use herald_core::logging_facility::init_test_capture;
use herald_core::policy::DAY_MS;
use herald_core::query::CHANNEL_TABLE;
use herald_core::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START, EVENT_VETO};
use herald_core::{CommandConfig, Correlation, FieldCollector, InvocationId, Storage, TraceId};
use herald_engine::{fetch_user, Invocation, RuntimeConfig};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_unknown_command_is_unmatched() {
    let (runtime, store, _clock) = runtime(RuntimeConfig::default());

    let reply = assert_ok!(runtime.handle(Invocation::new("alice", "missing")).await);
    assert_eq!(reply, None);
    assert_eq!(store.count("user").unwrap(), 0);
}

#[tokio::test]
async fn test_first_contact_creates_user_with_auto_authority() {
    let (runtime, store, _clock) = runtime(RuntimeConfig::default());
    echo(&mut *runtime.registry_mut().await, "echo", CommandConfig::default());

    let reply = runtime
        .handle(Invocation::new("alice", "echo").with_args(["hi"]))
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("ok 1"));

    let user = fetch_user(store.as_ref(), PLATFORM, "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.authority, Some(1));
    assert_eq!(user.extra.get(PLATFORM), Some(&json!("alice")));
}

#[tokio::test]
async fn test_zero_auto_authority_is_vetoed() {
    let config = RuntimeConfig {
        auto_authorize: 0,
        ..RuntimeConfig::default()
    };
    let (runtime, _store, _clock) = runtime(config);
    echo(&mut *runtime.registry_mut().await, "echo", CommandConfig::default());

    let reply = runtime.handle(Invocation::new("bob", "echo")).await.unwrap();
    assert_eq!(reply.as_deref(), Some("Insufficient authority."));
}

#[tokio::test]
async fn test_usage_persists_across_invocations() {
    let (runtime, store, clock) = runtime(RuntimeConfig::default());
    echo(
        &mut *runtime.registry_mut().await,
        "draw",
        CommandConfig::default().max_usage(1),
    );

    let first = runtime.handle(Invocation::new("alice", "draw")).await.unwrap();
    assert_eq!(first.as_deref(), Some("ok 0"));

    let user = fetch_user(store.as_ref(), PLATFORM, "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.usage.unwrap().counts.get("draw"), Some(&1));

    let second = runtime.handle(Invocation::new("alice", "draw")).await.unwrap();
    assert_eq!(second.as_deref(), Some("Daily usage limit reached."));

    clock.advance(Duration::from_millis(DAY_MS as u64));
    let next_day = runtime.handle(Invocation::new("alice", "draw")).await.unwrap();
    assert_eq!(next_day.as_deref(), Some("ok 0"));
}

#[tokio::test]
async fn test_interval_timer_persists() {
    let (runtime, store, clock) = runtime(RuntimeConfig::default());
    echo(
        &mut *runtime.registry_mut().await,
        "ping",
        CommandConfig::default().min_interval(Duration::from_secs(10)),
    );

    let first = runtime.handle(Invocation::new("alice", "ping")).await.unwrap();
    assert_eq!(first.as_deref(), Some("ok 0"));
    let timers = fetch_user(store.as_ref(), PLATFORM, "alice")
        .await
        .unwrap()
        .unwrap()
        .timers
        .unwrap();
    assert!(timers.expiries.contains_key("ping"));

    clock.advance(Duration::from_secs(5));
    let early = runtime.handle(Invocation::new("alice", "ping")).await.unwrap();
    assert_eq!(early.as_deref(), Some("Called too frequently, please wait."));
}

#[tokio::test]
async fn test_config_overrides_apply_before_dispatch() {
    let config = RuntimeConfig::from_toml_str("[commands.echo]\nauthority = 2").unwrap();
    let (runtime, _store, _clock) = runtime(config);
    echo(&mut *runtime.registry_mut().await, "echo", CommandConfig::default());
    assert_eq!(runtime.apply_config().await.unwrap(), 1);

    let reply = runtime.handle(Invocation::new("alice", "echo")).await.unwrap();
    assert_eq!(reply.as_deref(), Some("Insufficient authority."));
}

#[tokio::test]
async fn test_fault_after_default_fallback_is_swallowed_and_usage_kept() {
    let (runtime, store, _clock) = runtime(RuntimeConfig::default());
    {
        let mut registry = runtime.registry_mut().await;
        let id = registry
            .register("boom", "", CommandConfig::default().max_usage(5))
            .unwrap();
        registry
            .action(
                id,
                action_fn(|_argv, next: herald_core::Next| async move {
                    next.call().await?;
                    Err(anyhow::anyhow!("late failure"))
                }),
                false,
            )
            .unwrap();
    }

    let result = runtime.handle(Invocation::new("alice", "boom")).await;
    let reply = assert_ok!(result);
    assert_eq!(reply.as_deref(), Some(""));

    let usage = fetch_user(store.as_ref(), PLATFORM, "alice")
        .await
        .unwrap()
        .unwrap()
        .usage
        .unwrap();
    assert_eq!(usage.counts.get("boom"), Some(&1));
}

#[tokio::test]
async fn test_checker_error_is_returned() {
    let (runtime, _store, _clock) = runtime(RuntimeConfig::default());
    {
        let mut registry = runtime.registry_mut().await;
        let id = echo(&mut registry, "broken", CommandConfig::default());
        registry
            .before(
                id,
                herald_core::checker_fn(|_argv| Err(anyhow::anyhow!("checker down"))),
                false,
            )
            .unwrap();
    }

    let err = assert_err!(runtime.handle(Invocation::new("alice", "broken")).await);
    assert!(format!("{:#}", err).contains("checker down"));
}

#[tokio::test]
async fn test_lifecycle_logs_carry_invocation_id() {
    let capture = init_test_capture();
    let (runtime, _store, _clock) = runtime(RuntimeConfig::default());
    echo(&mut *runtime.registry_mut().await, "traced", CommandConfig::default());

    let correlation = Correlation {
        invocation_id: InvocationId::from_string("inv-traced-1".to_string()),
        trace_id: None,
    };
    let reply = runtime
        .handle(Invocation::new("alice", "traced").with_correlation(correlation))
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("ok 0"));

    let tagged = |event: &str| {
        capture.count_events(|e| {
            e.op.as_deref() == Some("handle")
                && e.event.as_deref() == Some(event)
                && e.field("invocation_id") == Some("inv-traced-1")
        })
    };
    assert_eq!(tagged(EVENT_START), 1);
    assert_eq!(tagged(EVENT_END), 1);
    assert_eq!(tagged(EVENT_END_ERROR), 0);
}

#[tokio::test]
async fn test_failed_invocation_error_names_invocation() {
    let capture = init_test_capture();
    let (runtime, _store, _clock) = runtime(RuntimeConfig::default());
    {
        let mut registry = runtime.registry_mut().await;
        let id = echo(&mut registry, "fragile", CommandConfig::default());
        registry
            .before(
                id,
                herald_core::checker_fn(|_argv| Err(anyhow::anyhow!("backend offline"))),
                false,
            )
            .unwrap();
    }

    let correlation = Correlation {
        invocation_id: InvocationId::from_string("inv-fragile-1".to_string()),
        trace_id: None,
    }
    .with_trace_id(TraceId::from_string("trace-fragile".to_string()));
    let err = assert_err!(
        runtime
            .handle(Invocation::new("alice", "fragile").with_correlation(correlation))
            .await
    );

    let ex = err.downcast_ref::<ExError>().unwrap();
    assert_eq!(ex.kind(), ExErrorKind::HandlerFault);
    assert_eq!(ex.command(), Some("fragile"));
    assert_eq!(ex.invocation_id().map(InvocationId::as_str), Some("inv-fragile-1"));
    assert_eq!(ex.trace_id().map(TraceId::as_str), Some("trace-fragile"));
    assert!(err.to_string().contains("(invocation: inv-fragile-1)"));
    assert!(format!("{:#}", err).contains("backend offline"));

    let logged = capture.count_events(|e| {
        e.op.as_deref() == Some("handle")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field("invocation_id") == Some("inv-fragile-1")
            && e.field("err.code") == Some("ERR_HANDLER_FAULT")
    });
    assert_eq!(logged, 1);
}

#[tokio::test]
async fn test_policy_veto_is_logged_as_policy_denied() {
    let capture = init_test_capture();
    let config = RuntimeConfig {
        auto_authorize: 0,
        ..RuntimeConfig::default()
    };
    let (runtime, _store, _clock) = runtime(config);
    echo(&mut *runtime.registry_mut().await, "guarded", CommandConfig::default());

    let correlation = Correlation {
        invocation_id: InvocationId::from_string("inv-guarded-1".to_string()),
        trace_id: None,
    };
    let reply = runtime
        .handle(Invocation::new("carol", "guarded").with_correlation(correlation))
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("Insufficient authority."));

    let vetoes: Vec<_> = capture
        .events_named(EVENT_VETO)
        .into_iter()
        .filter(|e| e.field("invocation_id") == Some("inv-guarded-1"))
        .collect();
    assert_eq!(vetoes.len(), 1);
    assert_eq!(vetoes[0].field("err.code"), Some("ERR_POLICY_DENIED"));
    assert_eq!(vetoes[0].field("command"), Some("guarded"));
}

#[tokio::test]
async fn test_parse_error_is_replied() {
    let (runtime, _store, _clock) = runtime(RuntimeConfig::default());
    echo(&mut *runtime.registry_mut().await, "echo", CommandConfig::default());

    let reply = runtime
        .handle(Invocation::new("alice", "echo").with_error("unterminated quote"))
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("unterminated quote"));
}

#[tokio::test]
async fn test_channel_fields_create_channel() {
    let (runtime, store, _clock) = runtime(RuntimeConfig::default());
    {
        let mut registry = runtime.registry_mut().await;
        let id = echo(&mut registry, "topic", CommandConfig::default());
        registry
            .channel_fields(id, FieldCollector::fields(["assignee"]))
            .unwrap();
    }

    let reply = runtime
        .handle(Invocation::new("alice", "topic").with_channel("general"))
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("ok 0"));
    assert_eq!(store.count(CHANNEL_TABLE).unwrap(), 1);

    let channel = store
        .get_channel(PLATFORM, "general", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.get("assignee"), Some(&json!("")));
}

#[tokio::test]
async fn test_no_policy_fields_skips_storage() {
    let (runtime, store, _clock) = runtime(RuntimeConfig::default());
    echo(
        &mut *runtime.registry_mut().await,
        "open",
        CommandConfig::default().authority(0),
    );

    let reply = runtime.handle(Invocation::new("alice", "open")).await.unwrap();
    assert_eq!(reply.as_deref(), Some("ok 0"));
    assert_eq!(store.count("user").unwrap(), 0);
}

struct Recorder(std::sync::Mutex<Vec<String>>);

#[async_trait::async_trait]
impl herald_core::Transport for Recorder {
    async fn send(&self, session: &herald_core::Session, text: &str) -> anyhow::Result<()> {
        self.0
            .lock()
            .unwrap()
            .push(format!("{}@{}: {}", session.user_id, session.platform, text));
        Ok(())
    }
}

#[tokio::test]
async fn test_actions_reach_the_adapter_transport() {
    let (runtime, _store, _clock) = runtime(RuntimeConfig::default());
    {
        let mut registry = runtime.registry_mut().await;
        let id = registry
            .register("notify", "", CommandConfig::default())
            .unwrap();
        registry
            .action(
                id,
                action_fn(|argv, _next| async move {
                    argv.session.send("working on it").await?;
                    Ok(Some("done".to_string()))
                }),
                false,
            )
            .unwrap();
    }

    let recorder = std::sync::Arc::new(Recorder(std::sync::Mutex::default()));
    let reply = runtime
        .handle(Invocation::new("alice", "notify").with_transport(recorder.clone()))
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("done"));
    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec!["alice@mock: working on it".to_string()]
    );
}
