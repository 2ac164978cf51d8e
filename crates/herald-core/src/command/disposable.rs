//! Reversible registration tokens and extension scopes

use crate::command::{CommandConfig, CommandId, CommandRegistry, HandlerId};
use crate::errors::Result;
use crate::fields::FieldTable;

/// Undo token returned by every registration call
///
/// Passing a token to [`CommandRegistry::revoke`] removes exactly what the
/// registration added. Revoking twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposable {
    Command(CommandId),
    Alias { command: CommandId, name: String },
    Shortcut(HandlerId),
    Option { command: CommandId, name: String },
    Checker { command: CommandId, handler: HandlerId },
    Action { command: CommandId, handler: HandlerId },
    FieldCollector {
        table: FieldTable,
        command: Option<CommandId>,
        handler: HandlerId,
    },
    Hook(HandlerId),
    Listener(HandlerId),
}

/// Teardown list for one extension
///
/// Collects the tokens of everything an extension registers and revokes them
/// in reverse registration order.
///
/// ```
/// use herald_core::{CommandRegistry, ExtensionScope};
///
/// let mut registry = CommandRegistry::new();
/// let mut scope = ExtensionScope::new("dice");
/// let roll = scope.command(&mut registry, "roll [sides:number]", "", Default::default()).unwrap();
/// scope.track(registry.alias(roll, "r").unwrap());
///
/// assert!(registry.get("r").is_some());
/// scope.dispose(&mut registry);
/// assert!(registry.get("roll").is_none());
/// assert!(registry.get("r").is_none());
/// ```
#[derive(Debug, Default)]
pub struct ExtensionScope {
    name: String,
    tokens: Vec<Disposable>,
}

impl ExtensionScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn track(&mut self, token: Disposable) {
        self.tokens.push(token);
    }

    pub fn track_all(&mut self, tokens: impl IntoIterator<Item = Disposable>) {
        self.tokens.extend(tokens);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Register a command and track every command the registration created,
    /// including missing parents
    ///
    /// # Errors
    ///
    /// Same as [`CommandRegistry::register`].
    pub fn command(
        &mut self,
        registry: &mut CommandRegistry,
        template: &str,
        description: &str,
        config: CommandConfig,
    ) -> Result<CommandId> {
        let (id, created) = registry.register_inner(template, description, config)?;
        self.tokens
            .extend(created.into_iter().map(Disposable::Command));
        Ok(id)
    }

    /// Revoke every tracked token, newest first
    ///
    /// Returns how many tokens still had something to remove.
    pub fn dispose(&mut self, registry: &mut CommandRegistry) -> usize {
        let mut revoked = 0;
        while let Some(token) = self.tokens.pop() {
            if registry.revoke(&token) {
                revoked += 1;
            }
        }
        tracing::debug!(
            component = module_path!(),
            op = "dispose_scope",
            scope = %self.name,
            revoked,
        );
        revoked
    }
}
