//! The editing surface: a [`Graph`] plus the [`History`] that records every
//! change made through it.

use kinship_graph::prelude::*;

use crate::assign::AssignCommand;
use crate::command::Command;
use crate::history::History;
use crate::lifecycle::{CreateCommand, DestroyCommand, DestroyHierarchyCommand, RenameCommand};
use crate::relation::{AdoptCommand, DisinvolveCommand, InvolveCommand, OrphanCommand};
use crate::EditorConfig;

/// Owns a graph and routes every mutation through its undo history.
///
/// Read access to the graph is unrestricted; write access only exists via
/// the command methods below, so every change can be undone.
#[derive(Debug)]
pub struct Editor {
    graph: Graph,
    history: History,
}

impl Editor {
    pub fn new(schema: Schema) -> Result<Self, GraphError> {
        Self::with_config(schema, EditorConfig::default())
    }

    pub fn with_config(schema: Schema, config: EditorConfig) -> Result<Self, GraphError> {
        Ok(Self {
            graph: Graph::with_config(schema, config.graph)?,
            history: History::with_config(config.history),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run any command through the history.
    pub fn execute(&mut self, command: Box<dyn Command>) -> Result<Option<Reference>, GraphError> {
        self.history.execute(&mut self.graph, command)
    }

    /// Create an entity. Returns a reference under its actual name.
    pub fn create(&mut self, type_tag: TypeTag, name: EntityName) -> Result<Reference, GraphError> {
        self.execute_with_subject(Box::new(CreateCommand::new(type_tag, name)))
    }

    /// Destroy an entity that holds no strong dependents.
    pub fn destroy(&mut self, target: &Reference) -> Result<(), GraphError> {
        self.execute(Box::new(DestroyCommand::new(target.clone())))
            .map(drop)
    }

    /// Destroy an entity and everything it strongly owns, as one step.
    pub fn destroy_hierarchy(&mut self, root: &Reference) -> Result<(), GraphError> {
        self.execute(Box::new(DestroyHierarchyCommand::new(root.clone())))
            .map(drop)
    }

    /// Rename an entity. Returns a reference under its new name.
    pub fn rename(&mut self, target: &Reference, name: EntityName) -> Result<Reference, GraphError> {
        self.execute_with_subject(Box::new(RenameCommand::new(target.clone(), name)))
    }

    pub fn adopt(&mut self, parent: &Reference, child: &Reference) -> Result<(), GraphError> {
        self.execute(Box::new(AdoptCommand::new(parent.clone(), child.clone())))
            .map(drop)
    }

    pub fn orphan(&mut self, parent_type: TypeTag, child: &Reference) -> Result<(), GraphError> {
        self.execute(Box::new(OrphanCommand::new(parent_type, child.clone())))
            .map(drop)
    }

    pub fn involve(&mut self, entity: &Reference, partner: &Reference) -> Result<(), GraphError> {
        self.execute(Box::new(InvolveCommand::new(entity.clone(), partner.clone())))
            .map(drop)
    }

    pub fn disinvolve(
        &mut self,
        entity: &Reference,
        partner_type: TypeTag,
    ) -> Result<(), GraphError> {
        self.execute(Box::new(DisinvolveCommand::new(entity.clone(), partner_type)))
            .map(drop)
    }

    pub fn assign<T: Component>(&mut self, target: &Reference, value: T) -> Result<(), GraphError> {
        self.execute(Box::new(AssignCommand::new(target.clone(), value)))
            .map(drop)
    }

    pub fn undo(&mut self) -> Result<bool, GraphError> {
        self.history.undo(&mut self.graph)
    }

    pub fn redo(&mut self) -> Result<bool, GraphError> {
        self.history.redo(&mut self.graph)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn execute_with_subject(&mut self, command: Box<dyn Command>) -> Result<Reference, GraphError> {
        let name = command.name();
        self.execute(command)?.ok_or_else(|| {
            StructuralError::CorruptState(format!("'{name}' recorded no subject")).into()
        })
    }
}
