//! End-to-end relation scenarios against the in-memory datasource.

use std::sync::Arc;

use serde_json::{json, Value};
use test_case::test_case;

use relgraph::datasource::{DatasourceError, SqlDialect};
use relgraph::entity::{
    display_value, DeclaredEntity, EntityCatalog, EntityId, EntityRef, EntitySchema,
    PropertyType, PropertyValues, SchemaRegistry,
};
use relgraph::relation::{ErrorKind, Relation, RelationError};

use super::fake_datasource::FakeDatasource;

#[derive(Debug)]
struct Person;

impl DeclaredEntity for Person {
    fn set_name(&self) -> &str {
        "persons"
    }

    fn id_property_names(&self) -> Vec<String> {
        vec!["id".to_string()]
    }

    fn label_property_names(&self) -> Vec<String> {
        vec!["name".to_string()]
    }

    fn schema(&self) -> EntitySchema {
        EntitySchema::new()
            .with("id", PropertyType::Integer)
            .with("name", PropertyType::String)
    }

    fn format_label(&self, values: &PropertyValues) -> String {
        values.get("name").map(display_value).unwrap_or_default()
    }
}

#[derive(Debug)]
struct Group;

impl DeclaredEntity for Group {
    fn set_name(&self) -> &str {
        "groups"
    }

    fn id_property_names(&self) -> Vec<String> {
        vec!["id".to_string()]
    }

    fn label_property_names(&self) -> Vec<String> {
        vec!["title".to_string()]
    }

    fn schema(&self) -> EntitySchema {
        EntitySchema::new()
            .with("id", PropertyType::Integer)
            .with("title", PropertyType::String)
    }

    fn format_label(&self, values: &PropertyValues) -> String {
        values.get("title").map(display_value).unwrap_or_default()
    }
}

struct Fixture {
    group: EntityRef,
    membership: EntityRef,
    person: EntityRef,
}

fn fixture() -> Fixture {
    let catalog = EntityCatalog::new();
    Fixture {
        group: catalog.declared(Arc::new(Group)).unwrap(),
        membership: catalog
            .virtual_entity(
                "memberships",
                EntitySchema::new()
                    .with("person_id", PropertyType::Integer)
                    .with("group_id", PropertyType::Integer),
                None,
            )
            .unwrap(),
        person: catalog.declared(Arc::new(Person)).unwrap(),
    }
}

fn group_members(f: &Fixture) -> Relation {
    Relation::create_on(&f.group, &["id"])
        .unwrap()
        .via(&f.membership, &["group_id"], &["person_id"], None)
        .unwrap()
        .from(&f.person, &["id"])
        .unwrap()
}

fn row(pairs: &[(&str, Value)]) -> PropertyValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn people() -> Vec<PropertyValues> {
    vec![
        row(&[("id", json!(1)), ("name", json!("Alice"))]),
        row(&[("id", json!(2)), ("name", json!("Bob"))]),
    ]
}

#[test]
fn test_group_members_compiles_to_source_star_filtered_on_target() {
    let f = fixture();
    let query = group_members(&f)
        .compile_query(Some(&EntityId::from(7)))
        .unwrap()
        .to_sql(SqlDialect::Ansi);

    assert_eq!(
        query.to_sql(),
        "SELECT \"source\".*\n\
         FROM \"groups\" AS \"target\"\n\
         INNER JOIN \"memberships\" AS \"memberships\" ON \"target\".\"id\" = \"memberships\".\"group_id\"\n\
         INNER JOIN \"persons\" AS \"source\" ON \"memberships\".\"person_id\" = \"source\".\"id\"\n\
         WHERE \"target\".\"id\" = ?\n"
    );
    assert_eq!(query.params(), vec![json!(7)]);
}

#[tokio::test]
async fn test_selector_maps_serialized_ids_to_labels() {
    let f = fixture();
    let datasource = FakeDatasource::new("fake://main", people());
    let registry = SchemaRegistry::new();

    let options = group_members(&f)
        .selector(&datasource, &registry, Some(&EntityId::from(7)))
        .await
        .unwrap();

    assert_eq!(options.to_json(), json!({"1": "Alice", "2": "Bob"}));
    assert_eq!(options.keys().collect::<Vec<_>>(), vec!["1", "2"]);

    let executed = datasource.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0]
        .sql
        .starts_with("SELECT \"source\".\"id\" AS \"id\", \"source\".\"name\" AS \"name\"\n"));
    assert_eq!(executed[0].params, vec![json!(7)]);
}

#[tokio::test]
async fn test_schema_is_created_once_per_datasource() {
    let f = fixture();
    let relation = group_members(&f);
    let datasource = FakeDatasource::new("fake://main", people()).with_existing("groups");
    let registry = SchemaRegistry::new();

    relation.render(&datasource, &registry, None).await.unwrap();
    relation.render(&datasource, &registry, None).await.unwrap();
    assert_eq!(datasource.created(), vec!["memberships", "persons"]);
    assert!(registry.is_present("groups", "fake://main"));
    assert!(registry.is_present("persons", "fake://main"));

    let other = FakeDatasource::new("fake://replica", people());
    relation.ensure_schema(&registry, &other).await.unwrap();
    assert_eq!(other.created(), vec!["groups", "memberships", "persons"]);
}

#[tokio::test]
async fn test_render_returns_rows_and_projection() {
    let f = fixture();
    let relation = group_members(&f)
        .showing("name", Some("member"))
        .unwrap()
        .showing("target.title", Some("group"))
        .unwrap()
        .sorted_by("name", true)
        .unwrap();
    let datasource = FakeDatasource::new("fake://main", people());

    let view = relation
        .render(&datasource, &SchemaRegistry::new(), Some(&EntityId::from(7)))
        .await
        .unwrap();

    let aliases: Vec<Option<&str>> = view.columns.iter().map(|c| c.alias.as_deref()).collect();
    assert_eq!(aliases, vec![Some("member"), Some("group")]);
    assert_eq!(view.cursor.len(), 2);
    assert_eq!(
        datasource.executed()[0].sql,
        "SELECT \"source\".\"name\" AS \"member\", \"target\".\"title\" AS \"group\"\n\
         FROM \"groups\" AS \"target\"\n\
         INNER JOIN \"memberships\" AS \"memberships\" ON \"target\".\"id\" = \"memberships\".\"group_id\"\n\
         INNER JOIN \"persons\" AS \"source\" ON \"memberships\".\"person_id\" = \"source\".\"id\"\n\
         WHERE \"target\".\"id\" = ?\n\
         ORDER BY \"source\".\"name\" ASC\n"
    );
}

#[test]
fn test_selector_through_blocking_runtime() {
    let f = fixture();
    let datasource = FakeDatasource::new("fake://main", people());
    let registry = SchemaRegistry::new();
    let relation = group_members(&f);

    let options =
        tokio_test::block_on(relation.selector(&datasource, &registry, None)).unwrap();
    assert_eq!(options.get("2"), Some("Bob"));
    assert!(datasource.executed()[0].params.is_empty());
}

#[tokio::test]
async fn test_execution_failure_is_a_datasource_error() {
    let f = fixture();
    let datasource = FakeDatasource::failing("fake://down");

    let err = group_members(&f)
        .selector(&datasource, &SchemaRegistry::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Datasource);
    assert_eq!(
        err,
        RelationError::Datasource(DatasourceError::Execution("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_select_instance_by_id() {
    let f = fixture();
    let datasource = FakeDatasource::new("fake://main", people()[..1].to_vec());

    let alice = f.person.select_instance(&datasource, &EntityId::from(1)).await.unwrap();
    assert_eq!(f.person.format_label(&alice), "Alice");
    assert_eq!(
        datasource.executed()[0].sql,
        "SELECT \"persons\".*\nFROM \"persons\" AS \"persons\"\nWHERE \"persons\".\"id\" = ?\nLIMIT 1\n"
    );

    let empty = FakeDatasource::new("fake://empty", Vec::new());
    let err = f.person.select_instance(&empty, &EntityId::from(3)).await.unwrap_err();
    assert!(matches!(
        err,
        RelationError::Datasource(DatasourceError::NotFound { .. })
    ));
}

fn tree() -> EntityRef {
    EntityCatalog::new()
        .virtual_entity(
            "nodes",
            EntitySchema::new()
                .with("id", PropertyType::Integer)
                .with("parent_id", PropertyType::Integer),
            Some(vec!["id".to_string()]),
        )
        .unwrap()
}

/// Ancestor chain: every hop joins a child's parent_id to its parent's id
fn ancestors(depth: usize) -> Relation {
    let nodes = tree();
    let builder = Relation::create_on(&nodes, &["id"]).unwrap();
    if depth == 0 {
        return builder.from(&nodes, &["parent_id"]).unwrap();
    }
    let mut builder = builder
        .via(&nodes, &["parent_id"], &["id"], Some("n1"))
        .unwrap();
    for level in 2..=depth {
        builder = builder
            .via(&nodes, &["parent_id"], &["id"], Some(format!("n{}", level).as_str()))
            .unwrap();
    }
    builder.from(&nodes, &["parent_id"]).unwrap()
}

#[test_case(0 ; "direct")]
#[test_case(1 ; "one waypoint")]
#[test_case(4 ; "four waypoints")]
fn test_joined_sets_are_waypoints_plus_two(depth: usize) {
    let plan = ancestors(depth).compile_query(None).unwrap();
    let aliases: Vec<String> = plan.joined_sets().map(|s| s.alias.clone()).collect();

    assert_eq!(aliases.len(), depth + 2);
    assert_eq!(aliases.first().map(String::as_str), Some("target"));
    assert_eq!(aliases.last().map(String::as_str), Some("source"));
    for (level, alias) in aliases[1..=depth].iter().enumerate() {
        assert_eq!(*alias, format!("n{}", level + 1));
    }
}

#[test]
fn test_compilation_is_deterministic_across_threads() {
    let relation = ancestors(3);
    let id = EntityId::from(11);
    let expected = relation.compile_query(Some(&id)).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| relation.compile_query(Some(&id)).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_duplicate_waypoints_with_aliases_are_independently_addressable() {
    let f = fixture();

    let err = Relation::create_on(&f.group, &["id"])
        .unwrap()
        .via(&f.membership, &["group_id"], &["person_id"], None)
        .unwrap()
        .via(&f.person, &["id"], &["id"], None)
        .unwrap()
        .via(&f.membership, &["person_id"], &["group_id"], None)
        .unwrap_err();
    assert!(matches!(err, RelationError::CircularWaypoint { .. }));

    // Groups sharing at least one member with the target group
    let relation = Relation::create_on(&f.group, &["id"])
        .unwrap()
        .via(&f.membership, &["group_id"], &["person_id"], Some("mine"))
        .unwrap()
        .on("\"mine\".\"person_id\" > ?", vec![json!(0)])
        .unwrap()
        .via(&f.person, &["id"], &["id"], Some("member"))
        .unwrap()
        .via(&f.membership, &["person_id"], &["group_id"], Some("theirs"))
        .unwrap()
        .on("\"theirs\".\"group_id\" <> \"mine\".\"group_id\"", vec![])
        .unwrap()
        .from(&f.group, &["id"])
        .unwrap();

    assert_eq!(relation.waypoint_conditions("mine").len(), 1);
    assert_eq!(relation.waypoint_conditions("theirs").len(), 1);

    let sql = relation.compile_query(Some(&EntityId::from(7))).unwrap().to_sql(SqlDialect::Ansi);
    assert!(sql.to_sql().contains(
        "INNER JOIN \"memberships\" AS \"theirs\" ON \"member\".\"id\" = \"theirs\".\"person_id\" AND (\"theirs\".\"group_id\" <> \"mine\".\"group_id\")\n"
    ));
    assert_eq!(sql.params(), vec![json!(0), json!(7)]);
}

#[test]
fn test_binding_is_replaced_atomically() {
    let f = fixture();
    let mut relation = group_members(&f);

    relation
        .bind_reference(1, &row(&[("person_id", json!(1))]))
        .unwrap();
    relation.unbind_reference(1).unwrap();
    relation
        .bind_reference(1, &row(&[("id", json!(2))]))
        .unwrap();

    assert_eq!(
        relation.reference_binding(1).unwrap(),
        Some(&row(&[("person_id", json!(2))]))
    );
    let plan = relation.compile_query(None).unwrap();
    assert_eq!(plan.params(), vec![json!(2)]);

    let err = relation
        .bind_reference(0, &row(&[("group_id", json!(1)), ("person_id", json!(2))]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Binding);
    assert!(!relation.is_reference_bound(0).unwrap());
}
