//! Linear undo/redo history.
//!
//! [`History`] owns the executed commands and a cursor. Commands before the
//! cursor are applied; commands at or after it have been undone and can be
//! redone. Executing a new command discards everything after the cursor.
//!
//! A command is only recorded after it validated and executed successfully,
//! so the history never holds a half-applied step.

use serde::{Deserialize, Serialize};

use kinship_graph::prelude::*;

use crate::command::Command;

/// History tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained commands. The oldest are dropped first.
    /// `None` keeps everything.
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct History {
    commands: Vec<Box<dyn Command>>,
    /// Number of applied commands; `commands[..cursor]` are applied.
    cursor: usize,
    config: HistoryConfig,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Validate and execute `command`, then record it. Returns the command's
    /// subject.
    ///
    /// # Errors
    ///
    /// Validation failures are returned untouched and nothing is recorded.
    /// An execution failure is logged and also leaves the history unchanged.
    pub fn execute(
        &mut self,
        graph: &mut Graph,
        mut command: Box<dyn Command>,
    ) -> Result<Option<Reference>, GraphError> {
        if let Err(err) = command.validate(graph) {
            tracing::debug!(command = command.name(), error = %err, "command rejected");
            return Err(err);
        }
        if let Err(err) = command.execute(graph) {
            tracing::error!(command = command.name(), error = %err, "command failed during execute");
            return Err(err);
        }

        let discarded = self.commands.len() - self.cursor;
        self.commands.truncate(self.cursor);
        let subject = command.subject();
        tracing::debug!(
            command = command.name(),
            subject = ?subject,
            discarded,
            "command executed"
        );
        self.commands.push(command);
        self.cursor += 1;
        self.enforce_limit();
        Ok(subject)
    }

    /// Reverse the last applied command. Returns `false` if there was none.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<bool, GraphError> {
        if self.cursor == 0 {
            return Ok(false);
        }
        let command = &mut self.commands[self.cursor - 1];
        if let Err(err) = command.unexecute(graph) {
            tracing::error!(command = command.name(), error = %err, "command failed during undo");
            return Err(err);
        }
        tracing::debug!(command = command.name(), cursor = self.cursor - 1, "undone");
        self.cursor -= 1;
        Ok(true)
    }

    /// Re-apply the next undone command. Returns `false` if there was none.
    pub fn redo(&mut self, graph: &mut Graph) -> Result<bool, GraphError> {
        let Some(command) = self.commands.get_mut(self.cursor) else {
            return Ok(false);
        };
        if let Err(err) = command.validate(graph) {
            tracing::debug!(command = command.name(), error = %err, "redo rejected");
            return Err(err);
        }
        if let Err(err) = command.execute(graph) {
            tracing::error!(command = command.name(), error = %err, "command failed during redo");
            return Err(err);
        }
        tracing::debug!(command = command.name(), cursor = self.cursor + 1, "redone");
        self.cursor += 1;
        Ok(true)
    }

    /// Forget every recorded command. The graph is left as it is.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// Command names, oldest first.
    pub fn labels(&self) -> Vec<&'static str> {
        self.commands.iter().map(|command| command.name()).collect()
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.config.limit else {
            return;
        };
        if self.commands.len() > limit {
            let excess = self.commands.len() - limit;
            self.commands.drain(..excess);
            self.cursor = self.cursor.saturating_sub(excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
