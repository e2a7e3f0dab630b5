//! Commands that link and unlink entities.

use kinship_graph::prelude::*;

use crate::command::{resolve, Command};

// ---------------------------------------------------------------------------
// Parent / child
// ---------------------------------------------------------------------------

/// Link `child` under `parent`, appending to the parent's list.
#[derive(Debug)]
pub struct AdoptCommand {
    parent: Reference,
    child: Reference,
}

impl AdoptCommand {
    pub fn new(parent: Reference, child: Reference) -> Self {
        Self { parent, child }
    }
}

impl Command for AdoptCommand {
    fn name(&self) -> &'static str {
        "adopt"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let parent = resolve(graph, &self.parent)?;
        let child = resolve(graph, &self.child)?;
        graph.check_add_child(parent, child)?;
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let parent = resolve(graph, &self.parent)?;
        let child = resolve(graph, &self.child)?;
        graph.add_child(parent, child)
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let parent = resolve(graph, &self.parent)?;
        let child = resolve(graph, &self.child)?;
        if graph.remove_child(parent, child)?.is_none() {
            tracing::warn!(parent = %self.parent, child = %self.child, "undo adopt: not linked");
        }
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.child.clone())
    }
}

/// Unlink `child` from its parent of `parent_type`. The former parent and
/// the child's list position are recorded so undo puts it back in place.
#[derive(Debug)]
pub struct OrphanCommand {
    parent_type: TypeTag,
    child: Reference,
    former: Option<(Reference, usize)>,
}

impl OrphanCommand {
    pub fn new(parent_type: TypeTag, child: Reference) -> Self {
        Self {
            parent_type,
            child,
            former: None,
        }
    }

    fn not_linked(&self, graph: &Graph) -> GraphError {
        ValidationError::NotLinked {
            child: self.child.clone(),
            parent_type: graph.schema().type_name(self.parent_type).to_owned(),
        }
        .into()
    }
}

impl Command for OrphanCommand {
    fn name(&self) -> &'static str {
        "orphan"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let child = resolve(graph, &self.child)?;
        match graph.parent(child, self.parent_type) {
            Some(_) => Ok(()),
            None => Err(self.not_linked(graph)),
        }
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let child = resolve(graph, &self.child)?;
        let Some((parent, position)) = graph.detach(child, self.parent_type)? else {
            return Err(self.not_linked(graph));
        };
        let parent = graph
            .reference(parent)
            .ok_or(ValidationError::StaleEntity(parent))?;
        self.former = Some((parent, position));
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some((parent, position)) = &self.former else {
            return Ok(());
        };
        let parent = resolve(graph, parent)?;
        let child = resolve(graph, &self.child)?;
        graph.insert_child(parent, child, *position)
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.child.clone())
    }
}

// ---------------------------------------------------------------------------
// Partners
// ---------------------------------------------------------------------------

/// Link two entities as partners.
#[derive(Debug)]
pub struct InvolveCommand {
    entity: Reference,
    partner: Reference,
}

impl InvolveCommand {
    pub fn new(entity: Reference, partner: Reference) -> Self {
        Self { entity, partner }
    }
}

impl Command for InvolveCommand {
    fn name(&self) -> &'static str {
        "involve"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let entity = resolve(graph, &self.entity)?;
        let partner = resolve(graph, &self.partner)?;
        graph.check_add_partner(entity, partner)?;
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let entity = resolve(graph, &self.entity)?;
        let partner = resolve(graph, &self.partner)?;
        graph.add_partner(entity, partner)
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let entity = resolve(graph, &self.entity)?;
        graph.remove_partner(entity, self.partner.type_tag)?;
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.entity.clone())
    }
}

/// Break the partner edge of `entity` towards `partner_type`, recording the
/// former partner.
#[derive(Debug)]
pub struct DisinvolveCommand {
    entity: Reference,
    partner_type: TypeTag,
    former: Option<Reference>,
}

impl DisinvolveCommand {
    pub fn new(entity: Reference, partner_type: TypeTag) -> Self {
        Self {
            entity,
            partner_type,
            former: None,
        }
    }

    fn not_partnered(&self, graph: &Graph) -> GraphError {
        ValidationError::NotPartnered {
            entity: self.entity.clone(),
            partner_type: graph.schema().type_name(self.partner_type).to_owned(),
        }
        .into()
    }
}

impl Command for DisinvolveCommand {
    fn name(&self) -> &'static str {
        "disinvolve"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let entity = resolve(graph, &self.entity)?;
        match graph.partner(entity, self.partner_type) {
            Some(_) => Ok(()),
            None => Err(self.not_partnered(graph)),
        }
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let entity = resolve(graph, &self.entity)?;
        let Some(partner) = graph.remove_partner(entity, self.partner_type)? else {
            return Err(self.not_partnered(graph));
        };
        self.former = Some(
            graph
                .reference(partner)
                .ok_or(ValidationError::StaleEntity(partner))?,
        );
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(former) = &self.former else {
            return Ok(());
        };
        let entity = resolve(graph, &self.entity)?;
        let partner = resolve(graph, former)?;
        graph.add_partner(entity, partner)
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.entity.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
