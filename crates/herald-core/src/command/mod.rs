//! Commands: named, tree-structured capabilities and their registry
//!
//! A [`Command`] carries its declared surface (options, positional
//! arguments, usage text), its policy configuration and two ordered handler
//! lists: checkers that may veto an invocation and actions that implement it.
//! Commands are owned by the [`CommandRegistry`] and handed out as
//! `Arc<Command>` snapshots, so an in-flight dispatch keeps the handler lists
//! it started with even if the registry changes underneath it.

pub mod decl;
pub mod disposable;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::computed::Computed;
use crate::dispatch::{Action, Checker};
use crate::fields::FieldCollector;
use crate::session::Session;

pub use decl::{parse_declaration, ArgumentDecl, Declaration};
pub use disposable::{Disposable, ExtensionScope};
pub use registry::{CommandRegistry, RegistryEvent};

/// Registry-assigned command identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// Identity of a registered handler (checker, action, collector, hook...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

/// Per-command policy configuration
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Hide all options from help output
    pub hide_options: bool,
    /// Hide the command from help output
    pub hidden: bool,
    /// Minimum authority required to invoke
    pub authority: Computed<u32>,
    /// Veto options that are not declared
    pub check_unknown: bool,
    /// Veto missing required or redundant positional arguments
    pub check_arg_count: bool,
    /// Render veto hints; when off, vetoes reply with an empty string
    pub show_warning: bool,
    /// Throttling bucket; defaults to the command name
    pub usage_name: Option<String>,
    /// Maximum invocations per day; `None` is unlimited
    pub max_usage: Computed<Option<u64>>,
    /// Minimum delay between invocations; zero disables the timer
    pub min_interval: Computed<Duration>,
    /// Only amend an existing command, never create one
    pub patch: bool,
    provided: ConfigKeys,
}

/// Keys set through the [`CommandConfig`] builders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConfigKeys(u16);

impl ConfigKeys {
    const HIDE_OPTIONS: u16 = 1;
    const HIDDEN: u16 = 1 << 1;
    const AUTHORITY: u16 = 1 << 2;
    const CHECK_UNKNOWN: u16 = 1 << 3;
    const CHECK_ARG_COUNT: u16 = 1 << 4;
    const SHOW_WARNING: u16 = 1 << 5;
    const USAGE_NAME: u16 = 1 << 6;
    const MAX_USAGE: u16 = 1 << 7;
    const MIN_INTERVAL: u16 = 1 << 8;

    fn insert(&mut self, key: u16) {
        self.0 |= key;
    }

    fn contains(self, key: u16) -> bool {
        self.0 & key != 0
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            hide_options: false,
            hidden: false,
            authority: Computed::Literal(1),
            check_unknown: false,
            check_arg_count: false,
            show_warning: true,
            usage_name: None,
            max_usage: Computed::Literal(None),
            min_interval: Computed::Literal(Duration::ZERO),
            patch: false,
            provided: ConfigKeys::default(),
        }
    }
}

impl CommandConfig {
    pub fn authority(mut self, authority: impl Into<Computed<u32>>) -> Self {
        self.authority = authority.into();
        self.provided.insert(ConfigKeys::AUTHORITY);
        self
    }

    pub fn max_usage(mut self, max_usage: u64) -> Self {
        self.max_usage = Computed::Literal(Some(max_usage));
        self.provided.insert(ConfigKeys::MAX_USAGE);
        self
    }

    pub fn max_usage_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Session) -> Option<u64> + Send + Sync + 'static,
    {
        self.max_usage = Computed::computed(f);
        self.provided.insert(ConfigKeys::MAX_USAGE);
        self
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Computed::Literal(interval);
        self.provided.insert(ConfigKeys::MIN_INTERVAL);
        self
    }

    pub fn usage_name(mut self, name: impl Into<String>) -> Self {
        self.usage_name = Some(name.into());
        self.provided.insert(ConfigKeys::USAGE_NAME);
        self
    }

    pub fn check_unknown(mut self, on: bool) -> Self {
        self.check_unknown = on;
        self.provided.insert(ConfigKeys::CHECK_UNKNOWN);
        self
    }

    pub fn check_arg_count(mut self, on: bool) -> Self {
        self.check_arg_count = on;
        self.provided.insert(ConfigKeys::CHECK_ARG_COUNT);
        self
    }

    pub fn show_warning(mut self, on: bool) -> Self {
        self.show_warning = on;
        self.provided.insert(ConfigKeys::SHOW_WARNING);
        self
    }

    pub fn hidden(mut self, on: bool) -> Self {
        self.hidden = on;
        self.provided.insert(ConfigKeys::HIDDEN);
        self
    }

    pub fn hide_options(mut self, on: bool) -> Self {
        self.hide_options = on;
        self.provided.insert(ConfigKeys::HIDE_OPTIONS);
        self
    }

    pub fn patch(mut self, on: bool) -> Self {
        self.patch = on;
        self
    }

    /// Copy over the keys `other` set through its builders; the rest of
    /// `self` is untouched
    pub(crate) fn merge(&mut self, other: CommandConfig) {
        let keys = other.provided;
        if keys.contains(ConfigKeys::HIDE_OPTIONS) {
            self.hide_options = other.hide_options;
        }
        if keys.contains(ConfigKeys::HIDDEN) {
            self.hidden = other.hidden;
        }
        if keys.contains(ConfigKeys::AUTHORITY) {
            self.authority = other.authority;
        }
        if keys.contains(ConfigKeys::CHECK_UNKNOWN) {
            self.check_unknown = other.check_unknown;
        }
        if keys.contains(ConfigKeys::CHECK_ARG_COUNT) {
            self.check_arg_count = other.check_arg_count;
        }
        if keys.contains(ConfigKeys::SHOW_WARNING) {
            self.show_warning = other.show_warning;
        }
        if keys.contains(ConfigKeys::USAGE_NAME) {
            self.usage_name = other.usage_name;
        }
        if keys.contains(ConfigKeys::MAX_USAGE) {
            self.max_usage = other.max_usage;
        }
        if keys.contains(ConfigKeys::MIN_INTERVAL) {
            self.min_interval = other.min_interval;
        }
        self.provided.insert(keys.0);
    }
}

/// A declared option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    pub description: String,
    /// Minimum authority required to pass this option
    pub authority: u32,
    /// Invocations carrying this option skip usage and interval accounting
    pub not_usage: bool,
    pub value_type: Option<String>,
    pub default: Option<Value>,
    pub hidden: bool,
}

impl OptionDecl {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            authority: 0,
            not_usage: false,
            value_type: None,
            default: None,
            hidden: false,
        }
    }

    pub fn authority(mut self, authority: u32) -> Self {
        self.authority = authority;
        self
    }

    pub fn not_usage(mut self) -> Self {
        self.not_usage = true;
        self
    }

    pub fn value_type(mut self, kind: impl Into<String>) -> Self {
        self.value_type = Some(kind.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// What a shortcut matches against
#[derive(Debug, Clone)]
pub enum ShortcutName {
    Text(String),
    Pattern(Regex),
}

impl From<&str> for ShortcutName {
    fn from(text: &str) -> Self {
        ShortcutName::Text(text.to_string())
    }
}

impl From<Regex> for ShortcutName {
    fn from(pattern: Regex) -> Self {
        ShortcutName::Pattern(pattern)
    }
}

/// Shortcut presets
#[derive(Debug, Clone, Default)]
pub struct ShortcutConfig {
    /// Only match when the message is addressed to the bot
    pub prefix: bool,
    /// Allow trailing text to be parsed as arguments
    pub fuzzy: bool,
    pub args: Vec<String>,
    pub options: BTreeMap<String, Value>,
}

/// A shortcut bound to a command
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub name: ShortcutName,
    pub command: CommandId,
    pub config: ShortcutConfig,
}

/// Position in a command's checker list
#[derive(Clone)]
pub(crate) enum CheckerSlot {
    /// Expands to the registry-wide `before_command` hooks at dispatch time
    BeforeCommand,
    Custom(HandlerId, Arc<dyn Checker>),
}

/// A registered command
#[derive(Clone)]
pub struct Command {
    pub id: CommandId,
    pub name: String,
    pub description: String,
    pub config: CommandConfig,
    pub parent: Option<CommandId>,
    pub children: Vec<CommandId>,
    /// Lowercased names this command is reachable by, canonical name first
    pub aliases: Vec<String>,
    pub options: Vec<OptionDecl>,
    pub arguments: Vec<ArgumentDecl>,
    pub usage: Option<Computed<String>>,
    pub examples: Vec<String>,
    pub(crate) checkers: Vec<CheckerSlot>,
    pub(crate) actions: Vec<(HandlerId, Arc<dyn Action>)>,
    pub(crate) user_fields: Vec<(HandlerId, FieldCollector)>,
    pub(crate) channel_fields: Vec<(HandlerId, FieldCollector)>,
}

impl Command {
    pub(crate) fn new(id: CommandId, name: String, description: String) -> Self {
        Self {
            id,
            name,
            description,
            config: CommandConfig::default(),
            parent: None,
            children: Vec::new(),
            aliases: Vec::new(),
            options: Vec::new(),
            arguments: Vec::new(),
            usage: None,
            examples: Vec::new(),
            checkers: vec![CheckerSlot::BeforeCommand],
            actions: Vec::new(),
            user_fields: Vec::new(),
            channel_fields: Vec::new(),
        }
    }

    /// Throttling bucket name
    pub fn usage_name(&self) -> &str {
        self.config.usage_name.as_deref().unwrap_or(&self.name)
    }

    pub fn option(&self, name: &str) -> Option<&OptionDecl> {
        self.options.iter().find(|option| option.name == name)
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Number of command-specific checkers, excluding the before-command hook
    pub fn checker_count(&self) -> usize {
        self.checkers
            .iter()
            .filter(|slot| matches!(slot, CheckerSlot::Custom(..)))
            .count()
    }

    /// Whether the session's identity may see and use this command
    ///
    /// An identity whose authority has not been loaded counts as unlimited.
    pub fn matches(&self, session: &Session) -> bool {
        match session.authority() {
            Some(authority) => self.config.authority.resolve(session) <= authority,
            None => true,
        }
    }

    /// Resolved usage text, if any
    pub fn usage_text(&self, session: &Session) -> Option<String> {
        self.usage.as_ref().map(|usage| usage.resolve(session))
    }

    /// Reconstruct source text from parsed arguments and options
    ///
    /// ```
    /// use herald_core::CommandRegistry;
    /// use serde_json::json;
    /// use std::collections::BTreeMap;
    ///
    /// let mut registry = CommandRegistry::new();
    /// let id = registry.register("echo <text>", "", Default::default()).unwrap();
    /// let command = registry.get_by_id(id).unwrap();
    ///
    /// let mut options = BTreeMap::new();
    /// options.insert("loud".to_string(), json!(true));
    /// options.insert("times".to_string(), json!(2));
    /// let source = command.stringify(&[json!("hello world")], &options);
    /// assert_eq!(source, "echo --loud --times 2 \"hello world\"");
    /// ```
    pub fn stringify(&self, args: &[Value], options: &BTreeMap<String, Value>) -> String {
        let mut output = self.name.clone();
        for (key, value) in options {
            match value {
                Value::Bool(true) => output.push_str(&format!(" --{}", key)),
                Value::Bool(false) => output.push_str(&format!(" --no-{}", key)),
                other => output.push_str(&format!(" --{} {}", key, quote(other))),
            }
        }
        for arg in args {
            output.push(' ');
            output.push_str(&quote(arg));
        }
        output
    }
}

fn quote(value: &Value) -> String {
    let text = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if text.contains(char::is_whitespace) {
        format!("\"{}\"", text)
    } else {
        text
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("aliases", &self.aliases)
            .field("checkers", &self.checkers.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::User;

    #[test]
    fn test_default_config() {
        let config = CommandConfig::default();
        assert_eq!(config.authority.literal(), Some(&1));
        assert!(config.show_warning);
        assert_eq!(config.max_usage.literal(), Some(&None));
        assert_eq!(config.min_interval.literal(), Some(&Duration::ZERO));
    }

    #[test]
    fn test_usage_name_defaults_to_name() {
        let mut command = Command::new(CommandId(1), "echo".to_string(), String::new());
        assert_eq!(command.usage_name(), "echo");
        command.config.usage_name = Some("shared".to_string());
        assert_eq!(command.usage_name(), "shared");
    }

    #[test]
    fn test_matches_authority() {
        let mut command = Command::new(CommandId(1), "ban".to_string(), String::new());
        command.config.authority = Computed::Literal(3);

        assert!(command.matches(&Session::new("mock", "1")));
        assert!(!command.matches(&Session::new("mock", "1").with_user(User::with_authority(2))));
        assert!(command.matches(&Session::new("mock", "1").with_user(User::with_authority(3))));
    }

    #[test]
    fn test_stringify_negated_flag() {
        let command = Command::new(CommandId(1), "echo".to_string(), String::new());
        let mut options = BTreeMap::new();
        options.insert("color".to_string(), Value::Bool(false));
        assert_eq!(command.stringify(&[], &options), "echo --no-color");
    }
}
