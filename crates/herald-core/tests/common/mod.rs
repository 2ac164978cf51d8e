use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use herald_core::policy::{self, PolicyEnv};
use herald_core::template::TemplateRegistry;
use herald_core::{Argv, CommandRegistry, FixedClock, Session, User};

/// A fixed instant well inside a day, so small advances stay on the same day
#[allow(dead_code)]
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Registry with the built-in policy checkers on a controllable clock
#[allow(dead_code)]
pub fn policy_registry() -> (CommandRegistry, FixedClock) {
    let clock = FixedClock::new(noon());
    let env = PolicyEnv::new(
        Arc::new(clock.clone()),
        Arc::new(TemplateRegistry::with_defaults()),
    );
    let mut registry = CommandRegistry::new();
    policy::install(&mut registry, Arc::new(env));
    (registry, clock)
}

/// Session whose user record carries `authority`
#[allow(dead_code)]
pub fn session_with_authority(authority: u32) -> Session {
    Session::new("mock", "alice").with_user(User::with_authority(authority))
}

/// Argv naming `command` with string positional arguments
#[allow(dead_code)]
pub fn argv(session: &Session, command: &str, args: &[&str]) -> Argv {
    Argv::new(session.clone())
        .with_name(command)
        .with_args(args.iter().map(|arg| serde_json::json!(arg)).collect())
}

/// Prepare and run `argv` with the default fallback
#[allow(dead_code)]
pub async fn run(registry: &CommandRegistry, argv: Argv) -> anyhow::Result<String> {
    registry.prepare(argv)?.execute(None).await
}
