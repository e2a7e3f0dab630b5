//! Commands that create, destroy and rename entities.

use kinship_graph::prelude::*;

use crate::command::{ensure_name_free, resolve, Command};

// ---------------------------------------------------------------------------
// CreateCommand
// ---------------------------------------------------------------------------

/// Create an entity.
///
/// The first execution picks the name (generating one for a generic request)
/// and records it. Undo captures the entity's state before destroying it;
/// redo restores that state under the recorded name, so a generated name is
/// reproduced exactly.
#[derive(Debug)]
pub struct CreateCommand {
    type_tag: TypeTag,
    name: EntityName,
    created: Option<Reference>,
    state: BinaryState,
}

impl CreateCommand {
    pub fn new(type_tag: TypeTag, name: EntityName) -> Self {
        Self {
            type_tag,
            name,
            created: None,
            state: BinaryState::new(),
        }
    }
}

impl Command for CreateCommand {
    fn name(&self) -> &'static str {
        "create"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        graph.schema().get(self.type_tag)?;
        match (&self.created, &self.name) {
            (Some(created), _) => ensure_name_free(graph, created.type_tag, &created.name, None),
            (None, EntityName::Unique(name)) => ensure_name_free(graph, self.type_tag, name, None),
            (None, EntityName::Generic(_)) => Ok(()),
        }
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        match &self.created {
            None => {
                let id = graph.create(self.type_tag, &self.name)?;
                self.created = graph.reference(id);
            }
            Some(created) => {
                self.state.rewind();
                graph.restore_entity(created, &mut self.state)?;
            }
        }
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(created) = &self.created else {
            return Ok(());
        };
        let id = resolve(graph, created)?;
        self.state.clear();
        graph.capture_entity(id, &mut self.state)?;
        graph.destroy(id)
    }

    fn subject(&self) -> Option<Reference> {
        self.created.clone()
    }
}

// ---------------------------------------------------------------------------
// DestroyCommand
// ---------------------------------------------------------------------------

/// Destroy a single entity that holds no strong dependents.
///
/// Execute captures components and every edge before destroying. Undo
/// recreates the entity under the same name and re-links each edge by
/// reference; edges whose other end no longer accepts the link are skipped
/// with a warning.
#[derive(Debug)]
pub struct DestroyCommand {
    target: Reference,
    state: BinaryState,
}

impl DestroyCommand {
    pub fn new(target: Reference) -> Self {
        Self {
            target,
            state: BinaryState::new(),
        }
    }

    pub fn target(&self) -> &Reference {
        &self.target
    }
}

impl Command for DestroyCommand {
    fn name(&self) -> &'static str {
        "destroy"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        let count = graph.dependent_count(id);
        if count > 0 {
            return Err(ValidationError::HasDependents {
                entity: self.target.clone(),
                count,
            }
            .into());
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        self.state.clear();
        graph.capture_entity(id, &mut self.state)?;
        graph.destroy(id)
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        self.state.rewind();
        graph.restore_entity(&self.target, &mut self.state)?;
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.target.clone())
    }
}

// ---------------------------------------------------------------------------
// DestroyHierarchyCommand
// ---------------------------------------------------------------------------

/// Destroy an entity together with everything it strongly owns.
///
/// The first execution walks the strong descendants and memoizes them as a
/// batch of [`DestroyCommand`]s in [`Graph::strong_subtree`] order: leaves
/// first, the root last. Redo replays the same batch. Undo runs it in
/// reverse, so each parent is back before its children re-link to it.
#[derive(Debug)]
pub struct DestroyHierarchyCommand {
    root: Reference,
    batch: Vec<DestroyCommand>,
}

impl DestroyHierarchyCommand {
    pub fn new(root: Reference) -> Self {
        Self {
            root,
            batch: Vec::new(),
        }
    }

    /// Targets of the memoized batch, in execution order. Empty until the
    /// first execution.
    pub fn members(&self) -> impl Iterator<Item = &Reference> {
        self.batch.iter().map(DestroyCommand::target)
    }
}

impl Command for DestroyHierarchyCommand {
    fn name(&self) -> &'static str {
        "destroy hierarchy"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        resolve(graph, &self.root)?;
        for member in &self.batch {
            resolve(graph, member.target())?;
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        if self.batch.is_empty() {
            let root = resolve(graph, &self.root)?;
            self.batch = graph
                .strong_subtree(root)
                .into_iter()
                .filter_map(|id| graph.reference(id))
                .map(DestroyCommand::new)
                .collect();
        }

        for index in 0..self.batch.len() {
            let member = &mut self.batch[index];
            let result = member.validate(graph).and_then(|()| member.execute(graph));
            if let Err(err) = result {
                tracing::error!(
                    root = %self.root,
                    member = %self.batch[index].target(),
                    index,
                    error = %err,
                    "hierarchy destroy failed, rolling back"
                );
                for done in self.batch[..index].iter_mut().rev() {
                    if let Err(rollback) = done.unexecute(graph) {
                        tracing::error!(
                            member = %done.target(),
                            error = %rollback,
                            "rollback of hierarchy member failed"
                        );
                    }
                }
                return Err(err);
            }
        }
        tracing::debug!(root = %self.root, members = self.batch.len(), "hierarchy destroyed");
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        for member in self.batch.iter_mut().rev() {
            member.unexecute(graph)?;
        }
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.root.clone())
    }
}

// ---------------------------------------------------------------------------
// RenameCommand
// ---------------------------------------------------------------------------

/// Rename an entity. Records the prior name and the name actually assigned,
/// so undo and redo swap between exactly those two.
#[derive(Debug)]
pub struct RenameCommand {
    target: Reference,
    name: EntityName,
    previous: Option<String>,
    resolved: Option<String>,
}

impl RenameCommand {
    pub fn new(target: Reference, name: EntityName) -> Self {
        Self {
            target,
            name,
            previous: None,
            resolved: None,
        }
    }
}

impl Command for RenameCommand {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        match (&self.resolved, &self.name) {
            (Some(resolved), _) => ensure_name_free(graph, self.target.type_tag, resolved, Some(id)),
            (None, EntityName::Unique(name)) => {
                ensure_name_free(graph, self.target.type_tag, name, Some(id))
            }
            (None, EntityName::Generic(_)) => Ok(()),
        }
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        let requested = match &self.resolved {
            Some(resolved) => EntityName::Unique(resolved.clone()),
            None => self.name.clone(),
        };
        self.previous = Some(graph.rename(id, &requested)?);
        self.resolved = graph.identity(id).map(|identity| identity.name.clone());
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let (Some(previous), Some(resolved)) = (&self.previous, &self.resolved) else {
            return Ok(());
        };
        let id = resolve(graph, &self.target.renamed(resolved.as_str()))?;
        graph.rename(id, &EntityName::Unique(previous.clone()))?;
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        let name = self.resolved.as_deref().unwrap_or(&self.target.name);
        Some(self.target.renamed(name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
