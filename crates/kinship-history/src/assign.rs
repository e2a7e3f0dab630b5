//! Component assignment.

use kinship_graph::prelude::*;

use crate::command::{resolve, Command};

/// Set a component value, remembering the value it replaced.
#[derive(Debug)]
pub struct AssignCommand<T: Component> {
    target: Reference,
    value: T,
    previous: Option<T>,
}

impl<T: Component> AssignCommand<T> {
    pub fn new(target: Reference, value: T) -> Self {
        Self {
            target,
            value,
            previous: None,
        }
    }
}

impl<T: Component> Command for AssignCommand<T> {
    fn name(&self) -> &'static str {
        "assign"
    }

    fn validate(&self, graph: &Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        graph.get::<T>(id)?;
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let id = resolve(graph, &self.target)?;
        self.previous = Some(graph.set(id, self.value.clone())?);
        Ok(())
    }

    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(previous) = &self.previous else {
            return Ok(());
        };
        let id = resolve(graph, &self.target)?;
        graph.set(id, previous.clone())?;
        Ok(())
    }

    fn subject(&self) -> Option<Reference> {
        Some(self.target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Title(String);

    #[test]
    fn assign_and_revert() {
        let mut schema = Schema::new();
        let note = schema.declare_type("Note").unwrap();
        let folder = schema.declare_type("Folder").unwrap();
        schema.add_component::<Title>(note, "title").unwrap();
        let mut graph = Graph::new(schema).unwrap();
        let id = graph.create(note, &EntityName::unique("n")).unwrap();
        graph.set(id, Title("old".into())).unwrap();

        let mut assign = AssignCommand::new(graph.reference(id).unwrap(), Title("new".into()));
        assign.validate(&graph).unwrap();
        assign.execute(&mut graph).unwrap();
        assert_eq!(graph.get::<Title>(id).unwrap(), &Title("new".into()));

        assign.unexecute(&mut graph).unwrap();
        assert_eq!(graph.get::<Title>(id).unwrap(), &Title("old".into()));

        let folder_id = graph.create(folder, &EntityName::unique("f")).unwrap();
        let assign = AssignCommand::new(graph.reference(folder_id).unwrap(), Title::default());
        assert!(matches!(
            assign.validate(&graph),
            Err(GraphError::Validation(ValidationError::ComponentNotDeclared { .. }))
        ));
    }
}
