//! Command registry for the authoring prompt

use std::collections::BTreeMap;

/// Whether the command loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Handler function type: mutable session → flow or error
pub type Handler<S> = Box<dyn Fn(&mut S) -> anyhow::Result<Flow>>;

/// Dispatch was asked for a name nothing registered.
#[derive(Debug, thiserror::Error)]
#[error("Unknown command: {0}")]
pub struct UnknownCommand(pub String);

struct Entry<S> {
    help: &'static str,
    handler: Handler<S>,
}

/// Registry of command handlers keyed by name
pub struct CommandRegistry<S> {
    commands: BTreeMap<String, Entry<S>>,
}

impl<S> CommandRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Register a handler for a command name
    ///
    /// # Example
    /// ```
    /// use navgraph_author::commands::{CommandRegistry, Flow};
    ///
    /// let mut registry: CommandRegistry<u32> = CommandRegistry::new();
    /// registry.register("bump", "add one", |n| { *n += 1; Ok(Flow::Continue) });
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, help: &'static str, handler: F)
    where
        F: Fn(&mut S) -> anyhow::Result<Flow> + 'static,
    {
        self.commands.insert(
            name.into(),
            Entry {
                help,
                handler: Box::new(handler),
            },
        );
    }

    /// Run a registered command
    pub fn dispatch(&self, name: &str, session: &mut S) -> anyhow::Result<Flow> {
        let entry = self
            .commands
            .get(name)
            .ok_or_else(|| UnknownCommand(name.to_string()))?;

        (entry.handler)(session)
    }

    /// Check whether a command is registered
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Command names with their help text, sorted by name
    pub fn commands(&self) -> Vec<(&str, &'static str)> {
        self.commands
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.help))
            .collect()
    }
}

impl<S> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_dispatch() {
        let mut registry: CommandRegistry<Vec<&str>> = CommandRegistry::new();

        registry.register("push", "push a marker", |log| {
            log.push("pushed");
            Ok(Flow::Continue)
        });

        let mut log = Vec::new();
        let flow = registry.dispatch("push", &mut log).unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(log, vec!["pushed"]);
    }

    #[test]
    fn test_unknown_command() {
        let registry: CommandRegistry<()> = CommandRegistry::new();

        let err = registry.dispatch("missing", &mut ()).unwrap_err();
        assert!(err.downcast_ref::<UnknownCommand>().is_some());
        assert_eq!(err.to_string(), "Unknown command: missing");
    }

    #[test]
    fn test_has_command_and_listing() {
        let mut registry: CommandRegistry<()> = CommandRegistry::new();

        registry.register("stop", "end", |_| Ok(Flow::Stop));
        registry.register("add", "start", |_| Ok(Flow::Continue));

        assert!(registry.has_command("stop"));
        assert!(!registry.has_command("missing"));
        assert_eq!(registry.commands(), vec![("add", "start"), ("stop", "end")]);
    }
}
