//! Invocation context

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command::Command;
use crate::session::Session;

/// One resolved attempt to run a command
///
/// Produced by the adapter's parser, consumed once by the dispatch pipeline.
/// Each action receives its own clone; mutations made by checkers are visible
/// to every action.
#[derive(Debug, Clone)]
pub struct Argv {
    pub command: Option<Arc<Command>>,
    /// The name or alias the invocation was addressed to
    pub name: Option<String>,
    pub args: Vec<Value>,
    pub options: BTreeMap<String, Value>,
    pub session: Session,
    /// Parse error set upstream; dispatch replies with it and runs nothing
    pub error: Option<String>,
    /// Raw tokens still awaiting option parsing, when the parser defers it
    pub tokens: Option<Vec<String>>,
    source: Option<String>,
}

impl Argv {
    pub fn new(session: Session) -> Self {
        Self {
            command: None,
            name: None,
            args: Vec::new(),
            options: BTreeMap::new(),
            session,
            error: None,
            tokens: None,
            source: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_command(mut self, command: Arc<Command>) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<String>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Original message text, when the adapter kept it
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Human-readable source text, reconstructed on first use
    pub fn source(&mut self) -> &str {
        if self.source.is_none() {
            let rebuilt = match &self.command {
                Some(command) => command.stringify(&self.args, &self.options),
                None => self.name.clone().unwrap_or_default(),
            };
            self.source = Some(rebuilt);
        }
        self.source.as_deref().unwrap_or_default()
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_prefers_adapter_text() {
        let mut argv = Argv::new(Session::new("mock", "1")).with_source("echo  hi");
        assert_eq!(argv.source(), "echo  hi");
    }

    #[test]
    fn test_source_without_command_uses_name() {
        let mut argv = Argv::new(Session::new("mock", "1"))
            .with_name("missing")
            .with_args(vec![json!("x")]);
        assert_eq!(argv.source(), "missing");
    }
}
