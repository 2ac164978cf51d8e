//! Runtime configuration loaded from TOML
//!
//! ```toml
//! profile = "production"
//! platform = "discord"
//! utc_offset_minutes = 480
//! auto_authorize = 1
//!
//! [commands.echo]
//! max_usage = 10
//! min_interval_ms = 5000
//! show_warning = false
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use herald_core::errors::{HeraldError, Result};
use herald_core::logging_facility::{self, Profile};
use herald_core::{CommandConfig, CommandRegistry, Computed};
use serde::{Deserialize, Serialize};

/// Top-level runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Logging profile name (`development`, `production` or `test`)
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Platform assumed for invocations that do not name one
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Offset of the daily usage boundary from UTC, in minutes east
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Authority given to users created on first contact
    #[serde(default = "default_auto_authorize")]
    pub auto_authorize: u32,

    /// Literal policy overrides keyed by command name
    #[serde(default)]
    pub commands: BTreeMap<String, CommandOverride>,
}

fn default_profile() -> String {
    "development".to_string()
}

fn default_platform() -> String {
    "default".to_string()
}

fn default_auto_authorize() -> u32 {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            platform: default_platform(),
            utc_offset_minutes: 0,
            auto_authorize: default_auto_authorize(),
            commands: BTreeMap::new(),
        }
    }
}

/// Policy values for one command; absent keys keep the registered value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandOverride {
    pub authority: Option<u32>,
    pub max_usage: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub usage_name: Option<String>,
    pub check_unknown: Option<bool>,
    pub check_arg_count: Option<bool>,
    pub show_warning: Option<bool>,
    pub hidden: Option<bool>,
    pub hide_options: Option<bool>,
}

impl CommandOverride {
    fn apply(&self, config: &mut CommandConfig) {
        if let Some(authority) = self.authority {
            config.authority = Computed::Literal(authority);
        }
        if let Some(max_usage) = self.max_usage {
            config.max_usage = Computed::Literal(Some(max_usage));
        }
        if let Some(ms) = self.min_interval_ms {
            config.min_interval = Computed::Literal(Duration::from_millis(ms));
        }
        if let Some(name) = &self.usage_name {
            config.usage_name = Some(name.clone());
        }
        if let Some(on) = self.check_unknown {
            config.check_unknown = on;
        }
        if let Some(on) = self.check_arg_count {
            config.check_arg_count = on;
        }
        if let Some(on) = self.show_warning {
            config.show_warning = on;
        }
        if let Some(on) = self.hidden {
            config.hidden = on;
        }
        if let Some(on) = self.hide_options {
            config.hide_options = on;
        }
    }
}

fn config_error(message: impl Into<String>) -> HeraldError {
    HeraldError::Config {
        message: message.into(),
    }
}

impl RuntimeConfig {
    /// Parse a configuration document
    ///
    /// # Errors
    ///
    /// Returns `Config` for malformed TOML, unknown keys or an unknown
    /// logging profile.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RuntimeConfig =
            toml::from_str(content).map_err(|e| config_error(e.to_string()))?;
        config.profile()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    ///
    /// # Errors
    ///
    /// Returns `Config` when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// Returns `Config` when the profile name is not recognised.
    pub fn profile(&self) -> Result<Profile> {
        self.profile.parse().map_err(config_error)
    }

    /// Initialize the logging facility with the configured profile
    ///
    /// # Errors
    ///
    /// Returns `Config` when the profile name is not recognised.
    pub fn init_logging(&self) -> Result<()> {
        logging_facility::init(self.profile()?);
        Ok(())
    }

    /// Apply the `[commands.*]` overrides to registered commands
    ///
    /// Names are resolved like invocations, so aliases work too. Returns the
    /// number of commands updated.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first override whose command is not
    /// registered; earlier overrides stay applied.
    pub fn apply_to(&self, registry: &mut CommandRegistry) -> Result<usize> {
        for (name, overrides) in &self.commands {
            let id = registry
                .find(name)
                .ok_or_else(|| config_error(format!("[commands.{}]: command not registered", name)))?;
            overrides.apply(registry.config_mut(id)?);
            tracing::debug!(component = module_path!(), op = "apply_config", command = %name);
        }
        Ok(self.commands.len())
    }
}
