//! Scenario tests for editing through the undo history.

use kinship_history::prelude::*;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct Title(String);

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct Priority(u8);

struct Types {
    folder: TypeTag,
    note: TypeTag,
    label: TypeTag,
    account: TypeTag,
    profile: TypeTag,
}

/// Folders strongly own notes and weakly hold labels. Notes strongly own a
/// single label. Accounts and profiles are partners.
fn editor() -> (Editor, Types) {
    let mut schema = Schema::new();
    let folder = schema.declare_type("Folder").unwrap();
    let note = schema.declare_type("Note").unwrap();
    let label = schema.declare_type("Label").unwrap();
    let account = schema.declare_type("Account").unwrap();
    let profile = schema.declare_type("Profile").unwrap();
    schema.add_component::<Title>(note, "title").unwrap();
    schema.add_component::<Priority>(note, "priority").unwrap();
    schema
        .declare_child(folder, note, Cardinality::OneToMany, Dependency::Strong)
        .unwrap();
    schema
        .declare_child(folder, label, Cardinality::OneToMany, Dependency::Weak)
        .unwrap();
    schema
        .declare_child(note, label, Cardinality::OneToOne, Dependency::Strong)
        .unwrap();
    schema.declare_partner(account, profile).unwrap();
    (
        Editor::new(schema).unwrap(),
        Types {
            folder,
            note,
            label,
            account,
            profile,
        },
    )
}

fn id(editor: &Editor, reference: &Reference) -> EntityId {
    editor.graph().resolve(reference).unwrap()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn undo_on_empty_history_is_noop() {
    let (mut editor, _) = editor();
    let before = editor.graph().snapshot();
    assert!(!editor.undo().unwrap());
    assert!(!editor.redo().unwrap());
    assert_eq!(editor.graph().snapshot(), before);
}

#[test]
fn generic_names_are_distinct_and_prefixed() {
    let (mut editor, t) = editor();
    let a = editor.create(t.note, EntityName::generic("Foo")).unwrap();
    let b = editor.create(t.note, EntityName::generic("Foo")).unwrap();
    assert_ne!(a.name, b.name);
    assert!(a.name.starts_with("Foo"));
    assert!(b.name.starts_with("Foo"));
}

#[test]
fn redo_of_create_reproduces_generated_name() {
    let (mut editor, t) = editor();
    let created = editor.create(t.note, EntityName::generic("Foo")).unwrap();
    editor.assign(&created, Title("kept".into())).unwrap();
    let after = editor.graph().snapshot();

    editor.undo().unwrap();
    editor.undo().unwrap();
    assert!(editor.graph().is_empty());

    editor.redo().unwrap();
    editor.redo().unwrap();
    assert_eq!(editor.graph().snapshot(), after);
    assert!(editor.graph().resolve(&created).is_ok());
}

#[test]
fn rename_to_taken_unique_name_fails() {
    let (mut editor, t) = editor();
    let a = editor.create(t.folder, EntityName::unique("a")).unwrap();
    editor.create(t.folder, EntityName::unique("b")).unwrap();
    let history_len = editor.history().len();

    let err = editor.rename(&a, EntityName::unique("b")).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(editor.history().len(), history_len);
    assert!(editor.graph().find(t.folder, "a").is_some());
    assert!(editor.graph().find(t.folder, "b").is_some());
}

#[test]
fn rename_undo_redo() {
    let (mut editor, t) = editor();
    let draft = editor.create(t.folder, EntityName::unique("draft")).unwrap();
    let renamed = editor.rename(&draft, EntityName::generic("final")).unwrap();
    assert!(editor.graph().resolve(&renamed).is_ok());

    editor.undo().unwrap();
    assert!(editor.graph().resolve(&draft).is_ok());
    assert!(editor.graph().resolve(&renamed).is_err());

    editor.redo().unwrap();
    assert!(editor.graph().resolve(&renamed).is_ok());
}

#[test]
fn destroy_with_strong_dependents_is_rejected() {
    let (mut editor, t) = editor();
    let folder = editor.create(t.folder, EntityName::unique("f")).unwrap();
    let note = editor.create(t.note, EntityName::unique("n")).unwrap();
    editor.adopt(&folder, &note).unwrap();

    let err = editor.destroy(&folder).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::HasDependents { count: 1, .. })
    ));
    assert_eq!(editor.graph().len(), 2);
}

#[test]
fn destroy_undo_restores_components_and_edges() {
    let (mut editor, t) = editor();
    let folder = editor.create(t.folder, EntityName::unique("f")).unwrap();
    let first = editor.create(t.note, EntityName::unique("first")).unwrap();
    let second = editor.create(t.note, EntityName::unique("second")).unwrap();
    let third = editor.create(t.note, EntityName::unique("third")).unwrap();
    for note in [&first, &second, &third] {
        editor.adopt(&folder, note).unwrap();
    }
    editor.assign(&second, Title("middle".into())).unwrap();
    editor.assign(&second, Priority(3)).unwrap();
    let before = editor.graph().snapshot();

    editor.destroy(&second).unwrap();
    assert!(editor.graph().resolve(&second).is_err());

    editor.undo().unwrap();
    assert_eq!(editor.graph().snapshot(), before);
    let children: Vec<String> = editor
        .graph()
        .children(id(&editor, &folder), t.note)
        .iter()
        .map(|&c| editor.graph().identity(c).unwrap().name.clone())
        .collect();
    assert_eq!(children, vec!["first", "second", "third"]);
}

// ---------------------------------------------------------------------------
// Hierarchies
// ---------------------------------------------------------------------------

#[test]
fn destroy_hierarchy_root_and_strong_child() {
    let (mut editor, t) = editor();
    let root = editor.create(t.folder, EntityName::unique("root")).unwrap();
    let child = editor.create(t.note, EntityName::unique("child")).unwrap();
    editor.adopt(&root, &child).unwrap();

    editor.destroy_hierarchy(&root).unwrap();
    assert!(editor.graph().find(t.folder, "root").is_none());
    assert!(editor.graph().find(t.note, "child").is_none());
}

#[test]
fn destroy_hierarchy_spares_weak_children() {
    let (mut editor, t) = editor();
    let root = editor.create(t.folder, EntityName::unique("root")).unwrap();
    let note = editor.create(t.note, EntityName::unique("note")).unwrap();
    let owned = editor.create(t.label, EntityName::unique("owned")).unwrap();
    let loose = editor.create(t.label, EntityName::unique("loose")).unwrap();
    editor.adopt(&root, &note).unwrap();
    editor.adopt(&note, &owned).unwrap();
    editor.adopt(&root, &loose).unwrap();
    let before = editor.graph().snapshot();

    editor.destroy_hierarchy(&root).unwrap();
    let graph = editor.graph();
    assert!(graph.resolve(&root).is_err());
    assert!(graph.resolve(&note).is_err());
    assert!(graph.resolve(&owned).is_err(), "strong grandchild goes too");
    let loose_id = graph.resolve(&loose).unwrap();
    assert!(!graph.has_parent(loose_id));

    editor.undo().unwrap();
    assert_eq!(editor.graph().snapshot(), before);

    editor.redo().unwrap();
    assert_eq!(editor.graph().len(), 1);
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

#[test]
fn adopt_then_orphan_restores_parentless_state() {
    let (mut editor, t) = editor();
    let folder = editor.create(t.folder, EntityName::unique("f")).unwrap();
    let label = editor.create(t.label, EntityName::unique("l")).unwrap();
    let count_before = editor.graph().child_count(id(&editor, &folder), t.label);

    editor.adopt(&folder, &label).unwrap();
    assert!(editor.graph().has_parent(id(&editor, &label)));

    editor.orphan(t.folder, &label).unwrap();
    assert!(!editor.graph().has_parent(id(&editor, &label)));
    assert_eq!(
        editor.graph().child_count(id(&editor, &folder), t.label),
        count_before
    );

    let err = editor.orphan(t.folder, &label).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::NotLinked { .. })
    ));
}

#[test]
fn one_to_one_relation_is_exclusive() {
    let (mut editor, t) = editor();
    let note = editor.create(t.note, EntityName::unique("n")).unwrap();
    let red = editor.create(t.label, EntityName::unique("red")).unwrap();
    let blue = editor.create(t.label, EntityName::unique("blue")).unwrap();
    editor.adopt(&note, &red).unwrap();
    assert!(matches!(
        editor.adopt(&note, &blue),
        Err(GraphError::Validation(ValidationError::ParentOccupied { .. }))
    ));
}

#[test]
fn involve_then_disinvolve_clears_both_sides() {
    let (mut editor, t) = editor();
    let account = editor.create(t.account, EntityName::unique("acct")).unwrap();
    let profile = editor.create(t.profile, EntityName::unique("prof")).unwrap();

    editor.involve(&account, &profile).unwrap();
    assert!(editor.graph().has_partner(id(&editor, &account)));

    editor.disinvolve(&account, t.profile).unwrap();
    assert!(!editor.graph().has_partner(id(&editor, &account)));
    assert!(!editor.graph().has_partner(id(&editor, &profile)));

    editor.undo().unwrap();
    assert_eq!(
        editor.graph().partner(id(&editor, &profile), t.account),
        Some(id(&editor, &account))
    );
}

#[test]
fn destroying_partner_unlinks_and_undo_relinks() {
    let (mut editor, t) = editor();
    let account = editor.create(t.account, EntityName::unique("acct")).unwrap();
    let profile = editor.create(t.profile, EntityName::unique("prof")).unwrap();
    editor.involve(&account, &profile).unwrap();

    editor.destroy(&profile).unwrap();
    assert!(!editor.graph().has_partner(id(&editor, &account)));

    editor.undo().unwrap();
    assert_eq!(
        editor.graph().partner(id(&editor, &account), t.profile),
        Some(id(&editor, &profile))
    );
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[test]
fn execute_unexecute_execute_matches_execute() {
    let (mut editor, t) = editor();
    let folder = editor.create(t.folder, EntityName::unique("f")).unwrap();
    let note = editor.create(t.note, EntityName::generic("n")).unwrap();

    let steps: Vec<Box<dyn Command>> = vec![
        Box::new(AdoptCommand::new(folder.clone(), note.clone())),
        Box::new(AssignCommand::new(note.clone(), Priority(9))),
        Box::new(RenameCommand::new(note.clone(), EntityName::generic("m"))),
        Box::new(CreateCommand::new(t.label, EntityName::generic("l"))),
    ];
    for step in steps {
        editor.execute(step).unwrap();
        let once = editor.graph().snapshot();
        assert!(editor.undo().unwrap());
        assert!(editor.redo().unwrap());
        assert_eq!(editor.graph().snapshot(), once);
    }
}

#[test]
fn undo_everything_returns_to_empty() {
    let (mut editor, t) = editor();
    let root = editor.create(t.folder, EntityName::unique("root")).unwrap();
    let note = editor.create(t.note, EntityName::generic("n")).unwrap();
    editor.adopt(&root, &note).unwrap();
    editor.assign(&note, Title("x".into())).unwrap();
    editor.destroy_hierarchy(&root).unwrap();

    while editor.undo().unwrap() {}
    assert!(editor.graph().is_empty());
    assert_eq!(editor.history().cursor(), 0);
    assert!(editor.history().can_redo());
}

#[test]
fn history_limit_from_config() {
    let mut schema = Schema::new();
    let folder = schema.declare_type("Folder").unwrap();
    let config = EditorConfig::from_json(r#"{ "history": { "limit": 1 } }"#).unwrap();
    let mut editor = Editor::with_config(schema, config).unwrap();

    editor.create(folder, EntityName::unique("a")).unwrap();
    editor.create(folder, EntityName::unique("b")).unwrap();
    assert!(editor.undo().unwrap());
    assert!(!editor.undo().unwrap());
    assert_eq!(editor.graph().len(), 1);
}

#[test]
fn exhausted_generic_name_is_structural_and_unrecorded() {
    let mut schema = Schema::new();
    let note = schema.declare_type("Note").unwrap();
    let config =
        EditorConfig::from_json(r#"{ "graph": { "random_name_attempts": 0 } }"#).unwrap();
    let mut editor = Editor::with_config(schema, config).unwrap();
    // Slot 1 is next, so the handle suffix collides with the counter suffix.
    editor.create(note, EntityName::unique("Foo_1")).unwrap();

    let err = editor.create(note, EntityName::generic("Foo")).unwrap_err();
    assert!(err.is_structural());
    assert_eq!(editor.history().len(), 1);
    assert_eq!(editor.history().cursor(), 1);
    assert_eq!(editor.graph().len(), 1);
}
