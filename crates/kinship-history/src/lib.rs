//! Kinship history -- reversible editing of a [`kinship_graph`] graph.
//!
//! Every change made through an [`Editor`](editor::Editor) is a
//! [`Command`](command::Command) recorded in a linear
//! [`History`](history::History). Commands hold durable references and
//! capture exactly the state they change, so undo and redo reproduce names,
//! component values, edges and child order.
//!
//! # Quick Start
//!
//! ```
//! use kinship_history::prelude::*;
//!
//! let mut schema = Schema::new();
//! let folder = schema.declare_type("Folder").unwrap();
//! let note = schema.declare_type("Note").unwrap();
//! schema
//!     .declare_child(folder, note, Cardinality::OneToMany, Dependency::Strong)
//!     .unwrap();
//!
//! let mut editor = Editor::new(schema).unwrap();
//! let inbox = editor.create(folder, EntityName::unique("inbox")).unwrap();
//! let todo = editor.create(note, EntityName::generic("todo")).unwrap();
//! editor.adopt(&inbox, &todo).unwrap();
//!
//! editor.destroy_hierarchy(&inbox).unwrap();
//! assert!(editor.graph().is_empty());
//!
//! editor.undo().unwrap();
//! assert_eq!(editor.graph().len(), 2);
//! ```

#![deny(unsafe_code)]

pub mod assign;
pub mod command;
pub mod editor;
pub mod history;
pub mod lifecycle;
pub mod relation;

use serde::{Deserialize, Serialize};

use kinship_graph::graph::GraphConfig;

use crate::history::HistoryConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an [`Editor`](editor::Editor).
///
/// Every field has a default, so partial JSON documents are accepted:
///
/// ```
/// use kinship_history::EditorConfig;
///
/// let config = EditorConfig::from_json(r#"{ "history": { "limit": 50 } }"#).unwrap();
/// assert_eq!(config.history.limit, Some(50));
/// assert_eq!(config.graph.suffix_separator, "_");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub graph: GraphConfig,
    pub history: HistoryConfig,
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Errors produced while loading an [`EditorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports, including the graph prelude.
pub mod prelude {
    pub use kinship_graph::prelude::*;

    pub use crate::assign::AssignCommand;
    pub use crate::command::Command;
    pub use crate::editor::Editor;
    pub use crate::history::{History, HistoryConfig};
    pub use crate::lifecycle::{
        CreateCommand, DestroyCommand, DestroyHierarchyCommand, RenameCommand,
    };
    pub use crate::relation::{AdoptCommand, DisinvolveCommand, InvolveCommand, OrphanCommand};
    pub use crate::{ConfigError, EditorConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_errors() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert_eq!(config, EditorConfig::default());

        let config = EditorConfig::from_json(
            r#"{ "graph": { "suffix_separator": "-", "name_seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.graph.suffix_separator, "-");
        assert_eq!(config.graph.name_seed, 7);
        assert_eq!(config.graph.random_name_attempts, 8);

        let err = EditorConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("invalid editor config"));
    }
}
