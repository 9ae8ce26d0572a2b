use grano_core::db::open_db_in_memory;
use grano_core::repo::attribute_repo::SqliteAttributeRepository;
use grano_core::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use grano_core::repo::schema_repo::SqliteSchemaRepository;
use grano_core::{
    Attribute, AttributeDescription, Datatype, DeferredChanges, EngineError, ObjectKind, Schema,
    SchemaDescription, SchemaEngine, SchemaOperation, ENTITY_DEFAULT, RELATION_DEFAULT,
};
use rusqlite::Connection;

type Engine<'c> = SchemaEngine<
    'c,
    SqliteSchemaRepository<'c>,
    SqliteAttributeRepository<'c>,
    SqliteProjectRepository<'c>,
>;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    SqliteProjectRepository::try_new(&conn)
        .unwrap()
        .create_project("acme", "Acme Corp")
        .unwrap();
    conn
}

fn engine<'c>(conn: &'c Connection, sink: &'c DeferredChanges) -> Engine<'c> {
    SchemaEngine::new(
        SqliteSchemaRepository::try_new(conn).unwrap(),
        SqliteAttributeRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
        sink,
    )
}

fn describe(name: &str, parent: Option<&Schema>, attributes: &[(&str, &str)]) -> SchemaDescription {
    let mut description = SchemaDescription::new("acme", name, format!("{name} schema"), ObjectKind::Entity);
    if let Some(parent) = parent {
        description = description.with_parent(parent.id);
    }
    for (attr_name, label) in attributes {
        description = description.with_attribute(AttributeDescription::new(*attr_name, *label));
    }
    description
}

fn create(engine: &Engine<'_>, description: SchemaDescription) -> Schema {
    engine.save(&description, None).unwrap()
}

fn update(engine: &Engine<'_>, description: SchemaDescription) -> Schema {
    let existing = engine.tree().resolve("acme", &description.name).unwrap();
    assert!(existing.is_some(), "{} should exist", description.name);
    engine.save(&description, existing).unwrap()
}

fn stored(engine: &Engine<'_>, schema: &Schema) -> Vec<Attribute> {
    engine.attributes().list(schema.id).unwrap()
}

fn names(attributes: &[Attribute]) -> Vec<(&str, bool)> {
    attributes
        .iter()
        .map(|attribute| (attribute.name.as_str(), attribute.inherited))
        .collect()
}

#[test]
fn child_copies_parent_attributes_with_equal_values() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(
        &engine,
        describe("person", None, &[]).with_attribute(
            AttributeDescription::new("age", "Age")
                .with_datatype(Datatype::Integer)
                .with_description("Age in years")
                .hidden(true),
        ),
    );
    let employee = create(&engine, describe("employee", Some(&person), &[]));

    let parent_attributes = stored(&engine, &person);
    let child_attributes = stored(&engine, &employee);
    assert_eq!(child_attributes.len(), 1);
    assert!(child_attributes[0].inherited);
    assert!(!parent_attributes[0].inherited);
    assert!(child_attributes[0].same_values(&parent_attributes[0]));
    assert_eq!(child_attributes[0].datatype, Datatype::Integer);
    assert_eq!(employee.parent_id, Some(person.id));
}

#[test]
fn saving_an_unchanged_description_writes_nothing() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[("name", "Full name")]));
    let employee = create(&engine, describe("employee", Some(&person), &[("salary", "Salary")]));
    let before = stored(&engine, &employee);

    update(&engine, describe("person", None, &[("name", "Full name")]));
    let report = engine
        .reconcile_from_description(
            &employee,
            &describe("employee", Some(&person), &[("salary", "Salary")]).attributes,
            SchemaOperation::Update,
        )
        .unwrap();

    assert!(report.is_noop());
    assert_eq!(report.unchanged, 2);
    assert_eq!(stored(&engine, &employee), before);
}

#[test]
fn inherited_attribute_wins_over_local_declaration() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[("age", "Age")]));
    let employee = create(&engine, describe("employee", Some(&person), &[("age", "Age at hire")]));

    let attributes = stored(&engine, &employee);
    assert_eq!(names(&attributes), vec![("age", true)]);
    assert_eq!(attributes[0].label, "Age");

    let report = engine
        .reconcile_from_description(
            &employee,
            &[AttributeDescription::new("age", "Age at hire")],
            SchemaOperation::Update,
        )
        .unwrap();
    assert_eq!(report.shadowed, vec!["age".to_string()]);
}

#[test]
fn duplicate_local_names_keep_the_first_declaration() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(
        &engine,
        describe("person", None, &[("name", "First label"), ("name", "Second label")]),
    );

    let attributes = stored(&engine, &person);
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].label, "First label");
}

#[test]
fn new_schema_without_parent_hangs_below_the_default_schema() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[]));
    let default = engine.tree().resolve("acme", ENTITY_DEFAULT).unwrap().unwrap();
    assert_eq!(person.parent_id, Some(default.id));
    assert_eq!(default.parent_id, None);
    assert_eq!(default.label, "Entity");

    let knows = create(
        &engine,
        SchemaDescription::new("acme", "knows", "Knows", ObjectKind::Relation),
    );
    let relation_default = engine.tree().resolve("acme", RELATION_DEFAULT).unwrap().unwrap();
    assert_eq!(knows.parent_id, Some(relation_default.id));
}

#[test]
fn circular_parent_falls_back_to_the_default_schema() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let a = create(&engine, describe("a", None, &[]));
    let b = create(&engine, describe("b", Some(&a), &[]));
    let c = create(&engine, describe("c", Some(&b), &[]));
    let default = engine.tree().resolve("acme", ENTITY_DEFAULT).unwrap().unwrap();

    assert!(engine.tree().is_circular(a.id, c.id).unwrap());
    assert!(engine.tree().is_circular(a.id, a.id).unwrap());
    assert!(!engine.tree().is_circular(c.id, a.id).unwrap());

    let a = update(&engine, describe("a", Some(&c), &[]));
    assert_eq!(a.parent_id, Some(default.id));

    let a = update(&engine, describe("a", Some(&a), &[]));
    assert_eq!(a.parent_id, Some(default.id));
}

#[test]
fn default_schema_never_gets_a_parent() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[]));
    let default = update(&engine, describe(ENTITY_DEFAULT, Some(&person), &[]));
    assert_eq!(default.parent_id, None);
}

#[test]
fn delete_removes_owned_attributes_and_orphans_children() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[("name", "Full name")]));
    let employee = create(&engine, describe("employee", Some(&person), &[("salary", "Salary")]));

    let removed = engine.delete(&person).unwrap();
    assert_eq!(removed, 1);
    assert!(engine.attributes().list(person.id).unwrap().is_empty());
    assert!(engine.attributes().get(person.id, "name").unwrap().is_none());
    assert!(engine.attributes().get(employee.id, "salary").unwrap().is_some());
    assert!(engine.tree().get(person.id).unwrap().is_none());

    let orphans = engine.tree().orphans("acme").unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, employee.id);
    assert_eq!(names(&stored(&engine, &employee)), vec![("name", true), ("salary", false)]);

    let report = engine.reconcile_from_parent(&orphans[0]).unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(names(&stored(&engine, &employee)), vec![("salary", false)]);
}

#[test]
fn edit_cascades_through_three_levels() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let a = create(&engine, describe("a", None, &[("a1", "First")]));
    let b = create(&engine, describe("b", Some(&a), &[("b1", "Second")]));
    let c = create(&engine, describe("c", Some(&b), &[("c1", "Third")]));

    update(&engine, describe("a", None, &[("a1", "First"), ("a2", "Added")]));
    assert_eq!(
        names(&stored(&engine, &c)),
        vec![("a1", true), ("a2", true), ("b1", true), ("c1", false)]
    );

    update(&engine, describe("a", None, &[("a2", "Added")]));
    assert_eq!(names(&stored(&engine, &b)), vec![("a2", true), ("b1", false)]);
    assert_eq!(
        names(&stored(&engine, &c)),
        vec![("a2", true), ("b1", true), ("c1", false)]
    );
}

#[test]
fn person_employee_scenario() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[("name", "Name"), ("age", "Age")]));
    let employee = create(&engine, describe("employee", Some(&person), &[("salary", "Salary")]));
    assert_eq!(
        names(&stored(&engine, &employee)),
        vec![("age", true), ("name", true), ("salary", false)]
    );

    update(&engine, describe("person", None, &[("name", "Name"), ("email", "Email")]));
    assert_eq!(
        names(&stored(&engine, &employee)),
        vec![("email", true), ("name", true), ("salary", false)]
    );
}

#[test]
fn changes_are_signalled_in_cascade_order() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let a = create(&engine, describe("a", None, &[]));
    let b = create(&engine, describe("b", Some(&a), &[]));
    create(&engine, describe("c", Some(&b), &[]));
    sink.take();

    update(&engine, describe("a", None, &[("x", "Extra")]));
    let signalled: Vec<(String, SchemaOperation)> = sink
        .take()
        .into_iter()
        .map(|change| (change.schema_name, change.operation))
        .collect();
    assert_eq!(
        signalled,
        vec![
            ("a".to_string(), SchemaOperation::Update),
            ("b".to_string(), SchemaOperation::Update),
            ("c".to_string(), SchemaOperation::Update),
        ]
    );

    engine.delete(&b).unwrap();
    let deleted = sink.take();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].operation, SchemaOperation::Delete);
    assert_eq!(deleted[0].schema_name, "b");
}

#[test]
fn saving_under_another_project_is_rejected() {
    let conn = setup();
    let sink = DeferredChanges::new();
    let engine = engine(&conn, &sink);

    let person = create(&engine, describe("person", None, &[]));
    let mut foreign = describe("person", None, &[]);
    foreign.project = "other".to_string();

    let err = engine.save(&foreign, Some(person)).unwrap_err();
    assert!(matches!(err, EngineError::ProjectMismatch { .. }));
}
