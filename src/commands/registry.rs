//! Command registry for resolving request names to command prototypes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{CommandErrorKind, ServerError};

use super::acquisition::{AcquireCommand, RecordingCommand};
use super::system::{EchoCommand, RequestIdsCommand};
use super::traits::Command;
use super::transform::{GetTransformCommand, UpdateTransformCommand};

/// Registry of command prototypes, indexed by every name they answer to.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    by_name: HashMap<&'static str, Arc<dyn Command>>,
    prototypes: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        let builtins: Vec<Box<dyn Command>> = vec![
            // System commands
            Box::new(EchoCommand::default()),
            Box::new(RequestIdsCommand::default()),
            // Acquisition commands
            Box::new(AcquireCommand::default()),
            Box::new(RecordingCommand::default()),
            // Transform commands
            Box::new(GetTransformCommand::default()),
            Box::new(UpdateTransformCommand::default()),
        ];

        for prototype in builtins {
            if let Err(e) = registry.register(prototype) {
                error!(error = %e, "Failed to register built-in command");
            }
        }

        info!(
            count = registry.by_name.len(),
            "Command registry initialized"
        );

        registry
    }

    /// Create a registry without any commands.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a prototype under every name it supports.
    ///
    /// Nothing is registered if one of its names is already taken.
    pub fn register(&mut self, prototype: Box<dyn Command>) -> Result<(), ServerError> {
        let names = prototype.command_names();
        if let Some(taken) = names.iter().find(|name| self.by_name.contains_key(*name)) {
            return Err(ServerError::Command {
                kind: CommandErrorKind::DuplicateCommandName {
                    name: taken.to_string(),
                },
            });
        }

        let prototype: Arc<dyn Command> = Arc::from(prototype);
        for &name in names {
            debug!(command = name, "Registering command");
            self.by_name.insert(name, Arc::clone(&prototype));
        }
        self.prototypes.push(prototype);
        Ok(())
    }

    /// Whether a command name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// A fresh, independent command instance for `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Command>, ServerError> {
        self.by_name
            .get(name)
            .map(|prototype| prototype.clone_box())
            .ok_or_else(|| ServerError::Command {
                kind: CommandErrorKind::UnknownCommand {
                    name: name.to_string(),
                },
            })
    }

    /// All registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Description of one command, or of every registered command for `None`.
    pub fn describe(&self, command_name: Option<&str>) -> String {
        match command_name {
            Some(name) => match self.by_name.get(name) {
                Some(prototype) => prototype.description(Some(name)),
                None => format!("Unknown command: {}", name),
            },
            None => self
                .prototypes
                .iter()
                .map(|prototype| prototype.description(None))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
