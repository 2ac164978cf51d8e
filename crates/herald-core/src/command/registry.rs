//! Command registry
//!
//! Owns every command, the alias table, shortcuts, the registry-wide
//! `before_command` hooks and the global field collectors. All lookups are
//! case-insensitive. There is no ambient registry: callers pass it by
//! reference to whatever needs it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::argv::Argv;
use crate::command::decl::{parse_declaration, split_path};
use crate::command::{
    CheckerSlot, Command, CommandConfig, CommandId, Disposable, HandlerId, OptionDecl, Shortcut,
    ShortcutConfig, ShortcutName,
};
use crate::computed::Computed;
use crate::dispatch::{Action, Checker, Dispatch};
use crate::errors::{HeraldError, Result};
use crate::fields::{validation_fields, FieldCollector, FieldTable};

/// Registry lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    CommandAdded { id: CommandId, name: String },
    CommandRemoved { id: CommandId, name: String },
}

type Listener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

pub struct CommandRegistry {
    commands: HashMap<CommandId, Arc<Command>>,
    order: Vec<CommandId>,
    aliases: HashMap<String, CommandId>,
    shortcuts: Vec<(HandlerId, Shortcut)>,
    before_command: Vec<(HandlerId, Arc<dyn Checker>)>,
    user_fields: Vec<(HandlerId, FieldCollector)>,
    channel_fields: Vec<(HandlerId, FieldCollector)>,
    listeners: Vec<(HandlerId, Listener)>,
    next_id: u64,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a registry with the built-in validation field collector
    pub fn new() -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
            order: Vec::new(),
            aliases: HashMap::new(),
            shortcuts: Vec::new(),
            before_command: Vec::new(),
            user_fields: Vec::new(),
            channel_fields: Vec::new(),
            listeners: Vec::new(),
            next_id: 0,
        };
        registry.global_user_fields(FieldCollector::dynamic(validation_fields));
        registry
    }

    fn next_handler(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    fn not_found(id: CommandId) -> HeraldError {
        HeraldError::CommandNotFound {
            name: id.to_string(),
        }
    }

    fn command_mut(&mut self, id: CommandId) -> Result<&mut Command> {
        self.commands
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or_else(|| Self::not_found(id))
    }

    fn emit(&self, event: RegistryEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    // ===== Lookup =====

    /// Resolve a name or alias, case-insensitively
    pub fn find(&self, name: &str) -> Option<CommandId> {
        self.aliases.get(&name.to_lowercase()).copied()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.find(name).and_then(|id| self.get_by_id(id))
    }

    pub fn get_by_id(&self, id: CommandId) -> Option<Arc<Command>> {
        self.commands.get(&id).cloned()
    }

    /// Commands in registration order
    pub fn commands(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.order.iter().filter_map(|id| self.commands.get(id))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn shortcuts(&self) -> impl Iterator<Item = &Shortcut> {
        self.shortcuts.iter().map(|(_, shortcut)| shortcut)
    }

    /// Slash-joined path from the root command, e.g. `admin/ban`
    pub fn path(&self, id: CommandId) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let command = self.commands.get(&current)?;
            names.push(command.name.clone());
            cursor = command.parent;
        }
        names.reverse();
        Some(names.join("/"))
    }

    // ===== Registration =====

    /// Register (or amend) the command described by `template`
    ///
    /// Path segments separated by `/` name children by the segment itself;
    /// segments starting with `.` name children by appending to the parent
    /// name (`rss.add`). Missing ancestors are created. Names are stored
    /// lowercased. An existing command keeps its identity: a non-empty
    /// description or argument list replaces the old one, and only the
    /// `config` keys set through its builders overwrite the old values.
    ///
    /// # Errors
    ///
    /// - `InvalidCommandDeclaration` for malformed templates
    /// - `CommandNotFound` when `config.patch` is set and the command is missing
    /// - `CyclicCommandParent` when the path would make a command its own ancestor
    pub fn register(
        &mut self,
        template: &str,
        description: &str,
        config: CommandConfig,
    ) -> Result<CommandId> {
        self.register_inner(template, description, config)
            .map(|(id, _)| id)
    }

    pub(crate) fn register_inner(
        &mut self,
        template: &str,
        description: &str,
        config: CommandConfig,
    ) -> Result<(CommandId, Vec<CommandId>)> {
        let declaration = parse_declaration(template)?;
        let segments = split_path(&declaration.path);
        let last = segments.len() - 1;

        let mut config = Some(config);
        let mut created = Vec::new();
        let mut parent: Option<CommandId> = None;

        for (index, segment) in segments.iter().enumerate() {
            let name = if segment.starts_with('.') {
                let parent_id = parent.ok_or_else(|| HeraldError::InvalidCommandDeclaration {
                    declaration: template.to_string(),
                    reason: "dotted name has no parent".to_string(),
                })?;
                let parent_name = self
                    .commands
                    .get(&parent_id)
                    .map(|command| command.name.clone())
                    .ok_or_else(|| Self::not_found(parent_id))?;
                format!("{}{}", parent_name, segment)
            } else {
                segment.trim_start_matches('/').to_string()
            };

            if name.is_empty() {
                return Err(HeraldError::InvalidCommandDeclaration {
                    declaration: template.to_string(),
                    reason: "empty path segment".to_string(),
                });
            }

            let is_last = index == last;
            let id = match self.find(&name) {
                Some(existing) => {
                    if let Some(parent_id) = parent {
                        self.attach(existing, parent_id)?;
                    }
                    if is_last {
                        if let Some(config) = config.take() {
                            let command = self.command_mut(existing)?;
                            if !description.is_empty() {
                                command.description = description.to_string();
                            }
                            if !declaration.arguments.is_empty() {
                                command.arguments = declaration.arguments.clone();
                            }
                            command.config.merge(config);
                        }
                    }
                    existing
                }
                None => {
                    let (description, config) = if is_last {
                        let config = config.take().unwrap_or_default();
                        if config.patch {
                            return Err(HeraldError::CommandNotFound { name });
                        }
                        (description.to_string(), config)
                    } else {
                        (String::new(), CommandConfig::default())
                    };

                    let id = self.create(name, description, config)?;
                    if is_last {
                        self.command_mut(id)?.arguments = declaration.arguments.clone();
                    }
                    if let Some(parent_id) = parent {
                        self.attach(id, parent_id)?;
                    }
                    created.push(id);
                    id
                }
            };
            parent = Some(id);
        }

        parent
            .map(|id| (id, created))
            .ok_or_else(|| HeraldError::InvalidCommandDeclaration {
                declaration: template.to_string(),
                reason: "missing command name".to_string(),
            })
    }

    fn create(&mut self, name: String, description: String, config: CommandConfig) -> Result<CommandId> {
        let name = name.to_lowercase();
        let key = name.clone();
        if self.aliases.contains_key(&key) {
            return Err(HeraldError::DuplicateCommandName { name: key });
        }

        self.next_id += 1;
        let id = CommandId(self.next_id);
        let mut command = Command::new(id, name.clone(), description);
        command.config = config;
        command.aliases.push(key.clone());

        self.aliases.insert(key, id);
        self.commands.insert(id, Arc::new(command));
        self.order.push(id);

        tracing::debug!(component = module_path!(), op = "register", command = %name);
        self.emit(RegistryEvent::CommandAdded { id, name });
        Ok(id)
    }

    fn attach(&mut self, child: CommandId, parent: CommandId) -> Result<()> {
        let child_name = self
            .commands
            .get(&child)
            .map(|command| command.name.clone())
            .ok_or_else(|| Self::not_found(child))?;

        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(HeraldError::CyclicCommandParent { command: child_name });
            }
            cursor = self.commands.get(&current).and_then(|command| command.parent);
        }

        let previous = self.command_mut(child)?.parent.replace(parent);
        if previous == Some(parent) {
            return Ok(());
        }
        if let Some(previous) = previous {
            if let Ok(old_parent) = self.command_mut(previous) {
                old_parent.children.retain(|id| *id != child);
            }
        }
        self.command_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Register a command below `parent`
    ///
    /// `def` is joined to the parent name with `/`, or appended directly when
    /// it starts with `.`.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register), plus `CommandNotFound` for an
    /// unknown parent.
    pub fn subcommand(
        &mut self,
        parent: CommandId,
        def: &str,
        description: &str,
        config: CommandConfig,
    ) -> Result<CommandId> {
        let parent_name = self
            .commands
            .get(&parent)
            .map(|command| command.name.clone())
            .ok_or_else(|| Self::not_found(parent))?;
        let template = if def.starts_with('.') {
            format!("{}{}", parent_name, def)
        } else {
            format!("{}/{}", parent_name, def)
        };
        self.register(&template, description, config)
    }

    /// Bind an additional, case-insensitive name
    ///
    /// Re-aliasing a name to the command that already owns it is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCommandName` when the name belongs to another
    /// command, `CommandNotFound` when `id` is unknown.
    pub fn alias(&mut self, id: CommandId, name: &str) -> Result<Disposable> {
        if !self.commands.contains_key(&id) {
            return Err(Self::not_found(id));
        }
        let key = name.to_lowercase();
        match self.aliases.get(&key) {
            Some(owner) if *owner != id => {
                return Err(HeraldError::DuplicateCommandName { name: key });
            }
            Some(_) => {}
            None => {
                self.aliases.insert(key.clone(), id);
                self.command_mut(id)?.aliases.push(key.clone());
            }
        }
        Ok(Disposable::Alias {
            command: id,
            name: key,
        })
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn shortcut(
        &mut self,
        id: CommandId,
        name: impl Into<ShortcutName>,
        config: ShortcutConfig,
    ) -> Result<Disposable> {
        if !self.commands.contains_key(&id) {
            return Err(Self::not_found(id));
        }
        let handler = self.next_handler();
        self.shortcuts.push((
            handler,
            Shortcut {
                name: name.into(),
                command: id,
                config,
            },
        ));
        Ok(Disposable::Shortcut(handler))
    }

    /// Declare an option, replacing any previous declaration of the same name
    ///
    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn option(&mut self, id: CommandId, option: OptionDecl) -> Result<Disposable> {
        let name = option.name.clone();
        let command = self.command_mut(id)?;
        match command.options.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => *existing = option,
            None => command.options.push(option),
        }
        Ok(Disposable::Option { command: id, name })
    }

    pub fn remove_option(&mut self, id: CommandId, name: &str) -> bool {
        let Ok(command) = self.command_mut(id) else {
            return false;
        };
        let before = command.options.len();
        command.options.retain(|option| option.name != name);
        command.options.len() != before
    }

    /// Add a checker; prepended checkers run before the `before_command` hooks
    ///
    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn before(
        &mut self,
        id: CommandId,
        checker: impl Checker + 'static,
        append: bool,
    ) -> Result<Disposable> {
        let handler = self.next_handler();
        let slot = CheckerSlot::Custom(handler, Arc::new(checker));
        let command = self.command_mut(id)?;
        if append {
            command.checkers.push(slot);
        } else {
            command.checkers.insert(0, slot);
        }
        Ok(Disposable::Checker { command: id, handler })
    }

    /// Add an action to the end of the chain, or the front when `prepend`
    ///
    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn action(
        &mut self,
        id: CommandId,
        action: impl Action + 'static,
        prepend: bool,
    ) -> Result<Disposable> {
        let handler = self.next_handler();
        let entry: (HandlerId, Arc<dyn Action>) = (handler, Arc::new(action));
        let command = self.command_mut(id)?;
        if prepend {
            command.actions.insert(0, entry);
        } else {
            command.actions.push(entry);
        }
        Ok(Disposable::Action { command: id, handler })
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn user_fields(&mut self, id: CommandId, collector: FieldCollector) -> Result<Disposable> {
        let handler = self.next_handler();
        self.command_mut(id)?.user_fields.push((handler, collector));
        Ok(Disposable::FieldCollector {
            table: FieldTable::User,
            command: Some(id),
            handler,
        })
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn channel_fields(&mut self, id: CommandId, collector: FieldCollector) -> Result<Disposable> {
        let handler = self.next_handler();
        self.command_mut(id)?.channel_fields.push((handler, collector));
        Ok(Disposable::FieldCollector {
            table: FieldTable::Channel,
            command: Some(id),
            handler,
        })
    }

    /// Collector consulted for every command
    pub fn global_user_fields(&mut self, collector: FieldCollector) -> Disposable {
        let handler = self.next_handler();
        self.user_fields.push((handler, collector));
        Disposable::FieldCollector {
            table: FieldTable::User,
            command: None,
            handler,
        }
    }

    pub fn global_channel_fields(&mut self, collector: FieldCollector) -> Disposable {
        let handler = self.next_handler();
        self.channel_fields.push((handler, collector));
        Disposable::FieldCollector {
            table: FieldTable::Channel,
            command: None,
            handler,
        }
    }

    /// Registry-wide pre-check run for every command
    pub fn before_command(&mut self, checker: impl Checker + 'static) -> Disposable {
        let handler = self.next_handler();
        self.before_command.push((handler, Arc::new(checker)));
        Disposable::Hook(handler)
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn usage(&mut self, id: CommandId, usage: impl Into<Computed<String>>) -> Result<()> {
        self.command_mut(id)?.usage = Some(usage.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn example(&mut self, id: CommandId, example: impl Into<String>) -> Result<()> {
        self.command_mut(id)?.examples.push(example.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CommandNotFound` when `id` is unknown.
    pub fn config_mut(&mut self, id: CommandId) -> Result<&mut CommandConfig> {
        Ok(&mut self.command_mut(id)?.config)
    }

    pub fn on_event<F>(&mut self, listener: F) -> Disposable
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        let handler = self.next_handler();
        self.listeners.push((handler, Arc::new(listener)));
        Disposable::Listener(handler)
    }

    // ===== Invocation =====

    /// Fields of `table` the upcoming checks need for `argv`
    ///
    /// Global collectors run first, then those of `argv.command`.
    pub fn collect_fields(&self, argv: &Argv, table: FieldTable) -> BTreeSet<String> {
        let (global, scoped) = match table {
            FieldTable::User => (
                &self.user_fields,
                argv.command.as_ref().map(|command| &command.user_fields),
            ),
            FieldTable::Channel => (
                &self.channel_fields,
                argv.command.as_ref().map(|command| &command.channel_fields),
            ),
        };

        let mut fields = BTreeSet::new();
        for (_, collector) in global.iter().chain(scoped.into_iter().flatten()) {
            collector.collect(argv, &mut fields);
        }
        fields
    }

    /// Capture the handlers for one invocation
    ///
    /// The command is taken from `argv.command`, or looked up by `argv.name`.
    /// The returned [`Dispatch`] no longer borrows the registry.
    ///
    /// # Errors
    ///
    /// Returns `CommandNotFound` when neither resolves to a command.
    pub fn prepare(&self, mut argv: Argv) -> Result<Dispatch> {
        let command = match &argv.command {
            Some(command) => Arc::clone(command),
            None => {
                let name = argv.name.clone().unwrap_or_default();
                let command = self
                    .get(&name)
                    .ok_or(HeraldError::CommandNotFound { name })?;
                argv.command = Some(Arc::clone(&command));
                command
            }
        };

        let mut checkers: Vec<Arc<dyn Checker>> = Vec::new();
        for slot in &command.checkers {
            match slot {
                CheckerSlot::BeforeCommand => checkers.extend(
                    self.before_command
                        .iter()
                        .map(|(_, checker)| Arc::clone(checker)),
                ),
                CheckerSlot::Custom(_, checker) => checkers.push(Arc::clone(checker)),
            }
        }
        let actions = command
            .actions
            .iter()
            .map(|(_, action)| Arc::clone(action))
            .collect();

        Ok(Dispatch {
            argv,
            checkers,
            actions,
        })
    }

    // ===== Disposal =====

    /// Remove a command and its whole subtree
    ///
    /// Drops every alias and shortcut bound to a removed command and detaches
    /// the root of the subtree from its parent. Unknown ids are ignored.
    pub fn dispose(&mut self, id: CommandId) {
        let Some(command) = self.commands.remove(&id) else {
            return;
        };
        self.emit(RegistryEvent::CommandRemoved {
            id,
            name: command.name.clone(),
        });

        for child in &command.children {
            self.dispose(*child);
        }

        self.shortcuts.retain(|(_, shortcut)| shortcut.command != id);
        for alias in &command.aliases {
            if self.aliases.get(alias) == Some(&id) {
                self.aliases.remove(alias);
            }
        }
        self.order.retain(|existing| *existing != id);
        if let Some(parent) = command.parent {
            if let Ok(parent) = self.command_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
        }

        tracing::debug!(component = module_path!(), op = "dispose", command = %command.name);
    }

    /// Undo one registration
    ///
    /// Returns whether anything was removed.
    pub fn revoke(&mut self, token: &Disposable) -> bool {
        match token {
            Disposable::Command(id) => {
                let existed = self.commands.contains_key(id);
                self.dispose(*id);
                existed
            }
            Disposable::Alias { command, name } => {
                if self.aliases.get(name) != Some(command) {
                    return false;
                }
                self.aliases.remove(name);
                if let Ok(command) = self.command_mut(*command) {
                    command.aliases.retain(|alias| alias != name);
                }
                true
            }
            Disposable::Shortcut(handler) => retain_without(&mut self.shortcuts, *handler),
            Disposable::Option { command, name } => self.remove_option(*command, name),
            Disposable::Checker { command, handler } => match self.command_mut(*command) {
                Ok(command) => {
                    let before = command.checkers.len();
                    command.checkers.retain(|slot| {
                        !matches!(slot, CheckerSlot::Custom(existing, _) if existing == handler)
                    });
                    command.checkers.len() != before
                }
                Err(_) => false,
            },
            Disposable::Action { command, handler } => match self.command_mut(*command) {
                Ok(command) => retain_without(&mut command.actions, *handler),
                Err(_) => false,
            },
            Disposable::FieldCollector {
                table,
                command: None,
                handler,
            } => match table {
                FieldTable::User => retain_without(&mut self.user_fields, *handler),
                FieldTable::Channel => retain_without(&mut self.channel_fields, *handler),
            },
            Disposable::FieldCollector {
                table,
                command: Some(command),
                handler,
            } => match self.command_mut(*command) {
                Ok(command) => match table {
                    FieldTable::User => retain_without(&mut command.user_fields, *handler),
                    FieldTable::Channel => retain_without(&mut command.channel_fields, *handler),
                },
                Err(_) => false,
            },
            Disposable::Hook(handler) => retain_without(&mut self.before_command, *handler),
            Disposable::Listener(handler) => retain_without(&mut self.listeners, *handler),
        }
    }
}

fn retain_without<T>(entries: &mut Vec<(HandlerId, T)>, handler: HandlerId) -> bool {
    let before = entries.len();
    entries.retain(|(existing, _)| *existing != handler);
    entries.len() != before
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dispatch::{action_fn, checker_fn};

    #[test]
    fn test_register_creates_alias() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("Echo <text>", "repeat", CommandConfig::default()).unwrap();

        assert_eq!(registry.find("echo"), Some(id));
        assert_eq!(registry.find("ECHO"), Some(id));
        let command = registry.get_by_id(id).unwrap();
        assert_eq!(command.name, "echo");
        assert_eq!(command.arguments.len(), 1);
    }

    #[test]
    fn test_slash_path_creates_parent() {
        let mut registry = CommandRegistry::new();
        let ban = registry.register("admin/ban <user>", "", CommandConfig::default()).unwrap();

        let admin = registry.find("admin").unwrap();
        assert_eq!(registry.get_by_id(ban).unwrap().name, "ban");
        assert_eq!(registry.get_by_id(ban).unwrap().parent, Some(admin));
        assert_eq!(registry.get_by_id(admin).unwrap().children, vec![ban]);
        assert_eq!(registry.path(ban).as_deref(), Some("admin/ban"));
    }

    #[test]
    fn test_dot_path_keeps_prefix() {
        let mut registry = CommandRegistry::new();
        let add = registry.register("rss.add <url>", "", CommandConfig::default()).unwrap();

        assert_eq!(registry.get_by_id(add).unwrap().name, "rss.add");
        assert_eq!(registry.find("rss.add"), Some(add));
        assert_eq!(registry.get_by_id(add).unwrap().parent, registry.find("rss"));
    }

    #[test]
    fn test_subcommand_composition() {
        let mut registry = CommandRegistry::new();
        let rss = registry.register("rss", "", CommandConfig::default()).unwrap();
        let list = registry.subcommand(rss, "list", "", CommandConfig::default()).unwrap();
        let remove = registry.subcommand(rss, ".remove", "", CommandConfig::default()).unwrap();

        assert_eq!(registry.get_by_id(list).unwrap().name, "list");
        assert_eq!(registry.get_by_id(remove).unwrap().name, "rss.remove");
        assert_eq!(registry.get_by_id(rss).unwrap().children, vec![list, remove]);
    }

    #[test]
    fn test_reparent_rejects_cycle() {
        let mut registry = CommandRegistry::new();
        registry.register("a/b", "", CommandConfig::default()).unwrap();
        let err = registry.register("b/a", "", CommandConfig::default()).unwrap_err();
        assert!(matches!(err, HeraldError::CyclicCommandParent { .. }));
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut registry = CommandRegistry::new();
        let b = registry.register("a/b", "", CommandConfig::default()).unwrap();
        registry.register("c/b", "", CommandConfig::default()).unwrap();

        let a = registry.find("a").unwrap();
        let c = registry.find("c").unwrap();
        assert!(registry.get_by_id(a).unwrap().children.is_empty());
        assert_eq!(registry.get_by_id(c).unwrap().children, vec![b]);
    }

    #[test]
    fn test_reregister_amends_in_place() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("echo", "old", CommandConfig::default()).unwrap();
        let again = registry
            .register("echo <text>", "new", CommandConfig::default().authority(3))
            .unwrap();

        assert_eq!(id, again);
        let command = registry.get_by_id(id).unwrap();
        assert_eq!(command.description, "new");
        assert_eq!(command.arguments.len(), 1);
        assert_eq!(command.config.authority.literal(), Some(&3));
    }

    #[test]
    fn test_reregister_keeps_unmentioned_config_keys() {
        let mut registry = CommandRegistry::new();
        let id = registry
            .register(
                "draw",
                "",
                CommandConfig::default()
                    .max_usage(3)
                    .min_interval(Duration::from_secs(10))
                    .show_warning(false),
            )
            .unwrap();
        registry
            .register("draw", "", CommandConfig::default().authority(2))
            .unwrap();

        let config = &registry.get_by_id(id).unwrap().config;
        assert_eq!(config.authority.literal(), Some(&2));
        assert_eq!(config.max_usage.literal(), Some(&Some(3)));
        assert_eq!(config.min_interval.literal(), Some(&Duration::from_secs(10)));
        assert!(!config.show_warning);
    }

    #[test]
    fn test_mixed_case_registration_resolves_to_one_command() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("Roll", "", CommandConfig::default()).unwrap();
        let again = registry
            .register("ROLL", "", CommandConfig::default().max_usage(1))
            .unwrap();

        assert_eq!(id, again);
        let command = registry.get_by_id(id).unwrap();
        assert_eq!(command.name, "roll");
        assert_eq!(command.usage_name(), "roll");
        assert_eq!(command.config.max_usage.literal(), Some(&Some(1)));
    }

    #[test]
    fn test_patch_requires_existing_command() {
        let mut registry = CommandRegistry::new();
        let err = registry
            .register("ghost", "", CommandConfig::default().patch(true))
            .unwrap_err();
        assert!(matches!(err, HeraldError::CommandNotFound { .. }));

        let id = registry.register("echo", "", CommandConfig::default().authority(2)).unwrap();
        registry
            .register("echo", "patched", CommandConfig::default().patch(true))
            .unwrap();
        let command = registry.get_by_id(id).unwrap();
        assert_eq!(command.description, "patched");
        assert_eq!(command.config.authority.literal(), Some(&2));

        registry
            .register("echo", "", CommandConfig::default().patch(true).max_usage(4))
            .unwrap();
        let config = &registry.get_by_id(id).unwrap().config;
        assert_eq!(config.authority.literal(), Some(&2));
        assert_eq!(config.max_usage.literal(), Some(&Some(4)));
    }

    #[test]
    fn test_alias_is_idempotent_for_owner() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("echo", "", CommandConfig::default()).unwrap();

        registry.alias(id, "say").unwrap();
        registry.alias(id, "SAY").unwrap();
        assert_eq!(registry.get_by_id(id).unwrap().aliases, vec!["echo", "say"]);
    }

    #[test]
    fn test_prepended_checker_runs_before_hook_slot() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("echo", "", CommandConfig::default()).unwrap();
        registry.before(id, checker_fn(|_| Ok(None)), false).unwrap();

        let command = registry.get_by_id(id).unwrap();
        assert!(matches!(command.checkers[0], CheckerSlot::Custom(..)));
        assert!(matches!(command.checkers[1], CheckerSlot::BeforeCommand));
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("echo", "", CommandConfig::default()).unwrap();
        let snapshot = registry.get_by_id(id).unwrap();

        registry
            .action(id, action_fn(|_argv, _next| async { Ok(None) }), false)
            .unwrap();
        assert_eq!(snapshot.action_count(), 0);
        assert_eq!(registry.get_by_id(id).unwrap().action_count(), 1);
    }

    #[test]
    fn test_revoke_checker_and_action() {
        let mut registry = CommandRegistry::new();
        let id = registry.register("echo", "", CommandConfig::default()).unwrap();
        let checker = registry.before(id, checker_fn(|_| Ok(None)), true).unwrap();
        let action = registry
            .action(id, action_fn(|_argv, _next| async { Ok(None) }), false)
            .unwrap();

        assert!(registry.revoke(&checker));
        assert!(registry.revoke(&action));
        assert!(!registry.revoke(&action));

        let command = registry.get_by_id(id).unwrap();
        assert_eq!(command.checker_count(), 0);
        assert_eq!(command.action_count(), 0);
    }
}
