//! Message template collaborator
//!
//! Every policy veto is rendered through a [`Templates`] implementation so
//! adapters can localize hints. [`TemplateRegistry`] is the built-in English
//! catalogue with `{0}`-style positional placeholders.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const LOW_AUTHORITY: &str = "internal.low-authority";
pub const USAGE_EXHAUSTED: &str = "internal.usage-exhausted";
pub const TOO_FREQUENT: &str = "internal.too-frequent";
pub const INSUFFICIENT_ARGUMENTS: &str = "internal.insufficient-arguments";
pub const REDUNDANT_ARGUMENTS: &str = "internal.redundant-arguments";
pub const UNKNOWN_OPTION: &str = "internal.unknown-option";

/// Formats a message key plus positional parameters into user-facing text
pub trait Templates: Send + Sync {
    fn format(&self, key: &str, params: &[String]) -> String;
}

/// In-memory template catalogue
///
/// Unknown keys render as the key itself so a missing translation is visible
/// rather than silent.
///
/// ```
/// use herald_core::template::{TemplateRegistry, Templates, UNKNOWN_OPTION};
///
/// let templates = TemplateRegistry::with_defaults();
/// let text = templates.format(UNKNOWN_OPTION, &["foo, bar".to_string()]);
/// assert_eq!(text, "Unknown options: foo, bar.");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: HashMap<String, String>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.set(LOW_AUTHORITY, "Insufficient authority.");
        registry.set(USAGE_EXHAUSTED, "Daily usage limit reached.");
        registry.set(TOO_FREQUENT, "Called too frequently, please wait.");
        registry.set(INSUFFICIENT_ARGUMENTS, "Insufficient arguments.");
        registry.set(REDUNDANT_ARGUMENTS, "Redundant arguments.");
        registry.set(UNKNOWN_OPTION, "Unknown options: {0}.");
        registry
    }

    /// Define or replace a template
    pub fn set(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\d+)\}").ok()).as_ref()
}

impl Templates for TemplateRegistry {
    /// Substitutes every placeholder in one pass; parameter text is never
    /// re-scanned, and placeholders without a parameter are kept verbatim.
    fn format(&self, key: &str, params: &[String]) -> String {
        let Some(template) = self.entries.get(key) else {
            return key.to_string();
        };
        let Some(placeholder) = placeholder_regex() else {
            return template.clone();
        };

        placeholder
            .replace_all(template, |captures: &Captures| {
                captures[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| params.get(index))
                    .cloned()
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }
}
