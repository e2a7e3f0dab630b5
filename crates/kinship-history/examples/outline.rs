//! Outline editor demo -- builds a small notebook, tears part of it down and
//! walks the undo history back and forth.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example outline -p kinship-history

use anyhow::Context;
use kinship_history::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct Title(String);

fn print_outline(editor: &Editor, heading: &str) -> anyhow::Result<()> {
    let snapshot = editor.graph().snapshot();
    println!("== {heading} ({} entities)", snapshot.len());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut schema = Schema::new();
    let notebook = schema.declare_type("Notebook")?;
    let page = schema.declare_type("Page")?;
    let author = schema.declare_type("Author")?;
    schema.add_component::<Title>(page, "title")?;
    schema.declare_child(notebook, page, Cardinality::OneToMany, Dependency::Strong)?;
    schema.declare_partner(notebook, author)?;

    let config = EditorConfig::from_json(r#"{ "history": { "limit": 64 } }"#)?;
    let mut editor = Editor::with_config(schema, config)?;

    let journal = editor.create(notebook, EntityName::unique("journal"))?;
    let ada = editor.create(author, EntityName::unique("ada"))?;
    editor.involve(&journal, &ada)?;
    for title in ["Monday", "Tuesday", "Wednesday"] {
        let entry = editor.create(page, EntityName::generic("entry"))?;
        editor.assign(&entry, Title(title.to_string()))?;
        editor.adopt(&journal, &entry)?;
    }
    print_outline(&editor, "built")?;

    if let Err(err) = editor.destroy(&journal) {
        println!("plain destroy refused: {err}");
    }
    editor
        .destroy_hierarchy(&journal)
        .context("destroying the journal hierarchy")?;
    print_outline(&editor, "after destroy_hierarchy")?;

    editor.undo()?;
    print_outline(&editor, "after undo")?;

    println!("history: {:?}", editor.history().labels());
    Ok(())
}
