//! Logging initialization

use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Human-readable output, debug level (invocation sources are visible)
    #[default]
    Development,
    /// JSON structured output, info level
    Production,
    /// No output; tests install a capture layer via `init_test_capture()`
    Test,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            "test" => Ok(Profile::Test),
            other => Err(format!("unknown logging profile: {}", other)),
        }
    }
}

static INIT_ONCE: Once = Once::new();

const DEV_FILTER: &str = "herald_core=debug,herald_store=debug,herald_engine=debug";
const PROD_FILTER: &str = "herald_core=info,herald_store=info,herald_engine=info";

/// Initialize the logging facility
///
/// Call once at process startup; later calls are no-ops. `RUST_LOG`
/// overrides the profile's default filter.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEV_FILTER)),
                )
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(PROD_FILTER)),
                )
                .init();
        }
        Profile::Test => {
            tracing_subscriber::registry().init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse() {
        assert_eq!("prod".parse::<Profile>(), Ok(Profile::Production));
        assert_eq!("Development".parse::<Profile>(), Ok(Profile::Development));
        assert!("verbose".parse::<Profile>().is_err());
    }
}
