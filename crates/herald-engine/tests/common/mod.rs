use std::sync::Arc;

use chrono::{TimeZone, Utc};
use herald_core::dispatch::action_fn;
use herald_core::{
    CommandConfig, CommandId, CommandRegistry, FixedClock, PolicyEnv, TemplateRegistry,
};
use herald_engine::{Runtime, RuntimeConfig};
use herald_store::MemoryStore;

pub const PLATFORM: &str = "mock";

/// Runtime over a fresh in-memory store on a clock fixed at noon
#[allow(dead_code)]
pub fn runtime(config: RuntimeConfig) -> (Runtime, Arc<MemoryStore>, FixedClock) {
    let store = Arc::new(MemoryStore::default());
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    let env = PolicyEnv::new(
        Arc::new(clock.clone()),
        Arc::new(TemplateRegistry::with_defaults()),
    );
    let config = RuntimeConfig {
        platform: PLATFORM.to_string(),
        ..config
    };
    let runtime = Runtime::with_env(store.clone(), env, config);
    (runtime, store, clock)
}

/// Register a command replying "ok" followed by its argument count
#[allow(dead_code)]
pub fn echo(registry: &mut CommandRegistry, template: &str, config: CommandConfig) -> CommandId {
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
