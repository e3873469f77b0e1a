//! End-to-end tests for the schema-migration engine.
//!
//! Each test runs a real migration against the memory store and asserts
//! both the visible state afterwards and the shape of the history left
//! behind.

mod common;

use common::{minutes, Fixture};

use async_trait::async_trait;
use serde_json::json;

use branchgraph::migrations::execute_queries;
use branchgraph::query::ops;
use branchgraph::query::{Query, QueryStats, QueryType};
use branchgraph::schema::{AttributeSchema, NodeSchema, SchemaPath};
use branchgraph::{
    Direction, EdgeKind, EdgeStatus, Error, GraphStore, MemoryStore, SchemaMigration, TxMode,
    Value,
};

fn car_schema() -> NodeSchema {
    NodeSchema::new("Test", "TestCar")
        .with_attribute(AttributeSchema::new("name", "Text"))
}

fn car_schema_with_doors() -> NodeSchema {
    car_schema()
        .with_attribute(AttributeSchema::new("nbr_doors", "Number").with_default(json!(4)))
}

// ============================================================================
// 1. NodeAttributeAdd materializes the attribute on every live node
// ============================================================================

#[tokio::test]
async fn test_attribute_add_creates_subtree_on_all_nodes() {
    let fx = Fixture::new();
    let car1 = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let car2 = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("two"))])
        .await;

    let migration = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    let main = fx.registry.get_branch("main").unwrap().clone();
    let result = migration
        .execute(&fx.store, &fx.registry, &main, Some(minutes(-30)))
        .await;
    assert!(result.success(), "{:?}", result.errors);

    for car in [car1, car2] {
        assert_eq!(
            fx.attribute_value("main", minutes(0), car, "nbr_doors").await,
            Some(Value::Int(4))
        );
        // The flag subtree came with it.
        let attribute = fx.attribute_node("main", minutes(0), car, "nbr_doors").await.unwrap();
        assert_eq!(attribute.get("branch_support"), Some(&Value::from("aware")));
    }
    // Before the migration ran, the attribute does not exist.
    assert_eq!(fx.attribute_value("main", minutes(-40), car1, "nbr_doors").await, None);
}

// ============================================================================
// 2. Re-running the same migration is a no-op for already-migrated nodes
// ============================================================================

#[tokio::test]
async fn test_attribute_add_skips_nodes_that_already_have_it() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;

    let migration = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    let main = fx.registry.get_branch("main").unwrap().clone();
    for at in [minutes(-30), minutes(-20)] {
        let result = migration.execute(&fx.store, &fx.registry, &main, Some(at)).await;
        assert!(result.success(), "{:?}", result.errors);
    }

    // Exactly two HAS_ATTRIBUTE records total: name + nbr_doors, no dupes.
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let records = fx
        .store
        .edges_of(&tx, car, Direction::Outgoing, &[EdgeKind::HasAttribute])
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

// ============================================================================
// 3. Off the default branch, branch support is forced to local
// ============================================================================

#[tokio::test]
async fn test_attribute_add_on_branch_is_local_and_invisible_to_origin() {
    let mut fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    fx.registry.create_branch("branch1", "main", minutes(-45)).unwrap();

    let migration = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    let branch1 = fx.registry.get_branch("branch1").unwrap().clone();
    let result = migration
        .execute(&fx.store, &fx.registry, &branch1, Some(minutes(-30)))
        .await;
    assert!(result.success(), "{:?}", result.errors);

    let attribute = fx.attribute_node("branch1", minutes(0), car, "nbr_doors").await.unwrap();
    assert_eq!(attribute.get("branch_support"), Some(&Value::from("local")));
    // The origin branch never sees it.
    assert_eq!(fx.attribute_node("main", minutes(0), car, "nbr_doors").await, None);
}

// ============================================================================
// 4. Add then remove leaves no active edge but keeps the history (P6)
// ============================================================================

#[tokio::test]
async fn test_attribute_add_then_remove_keeps_history() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();

    let add = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    assert!(add.execute(&fx.store, &fx.registry, &main, Some(minutes(-30))).await.success());

    let remove = SchemaMigration::node_attribute_remove(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    assert!(remove.execute(&fx.store, &fx.registry, &main, Some(minutes(-10))).await.success());

    // No active attribute now...
    assert_eq!(fx.attribute_node("main", minutes(0), car, "nbr_doors").await, None);
    // ...but the full history is still queryable.
    assert_eq!(
        fx.attribute_value("main", minutes(-20), car, "nbr_doors").await,
        Some(Value::Int(4))
    );

    // The teardown left deleted-status mirrors, not destroyed records.
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let records = fx
        .store
        .edges_of(&tx, car, Direction::Outgoing, &[EdgeKind::HasAttribute])
        .await
        .unwrap();
    assert!(records.iter().any(|r| r.status == EdgeStatus::Deleted));
    assert!(
        records
            .iter()
            .filter(|r| r.status == EdgeStatus::Active && r.is_open())
            .count()
            <= 1 // only the untouched `name` attribute remains open
    );
}

// ============================================================================
// 5. Rename re-links the exact same value and flag elements (P8)
// ============================================================================

#[tokio::test]
async fn test_attribute_rename_preserves_relationship_targets() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();

    let old_attribute = fx.attribute_node("main", minutes(-50), car, "name").await.unwrap();

    let new_schema = NodeSchema::new("Test", "TestCar")
        .with_attribute(AttributeSchema::new("title", "Text"));
    let migration = SchemaMigration::attribute_name_update(
        SchemaPath::field("TestCar", "title"),
        new_schema,
        car_schema(),
    )
    .unwrap();
    assert!(
        migration.execute(&fx.store, &fx.registry, &main, Some(minutes(-10))).await.success()
    );

    // Old name gone, new name active, value identical.
    assert_eq!(fx.attribute_node("main", minutes(0), car, "name").await, None);
    let new_attribute = fx.attribute_node("main", minutes(0), car, "title").await.unwrap();
    assert_eq!(fx.attribute_value("main", minutes(0), car, "title").await, Some(Value::from("one")));

    // The value/flag edges point at the exact same elements as before.
    let filter = fx.filter("main", minutes(0));
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    for kind in [EdgeKind::HasValue, EdgeKind::IsProtected, EdgeKind::IsVisible] {
        let old_records = fx
            .store
            .edges_of(&tx, old_attribute.id, Direction::Outgoing, &[kind])
            .await
            .unwrap();
        let new_records = fx
            .store
            .edges_of(&tx, new_attribute.id, Direction::Outgoing, &[kind])
            .await
            .unwrap();
        let old_target = old_records.first().unwrap().target;
        let new_current = ops::resolve_per_logical_edge(&new_records, &filter);
        assert_eq!(new_current.len(), 1);
        assert_eq!(new_current[0].target, old_target);
    }
}

// ============================================================================
// 6. Rename on a non-default branch shadows instead of ending
// ============================================================================

#[tokio::test]
async fn test_attribute_rename_on_branch_leaves_origin_records_open() {
    let mut fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    fx.registry.create_branch("branch1", "main", minutes(-45)).unwrap();
    let branch1 = fx.registry.get_branch("branch1").unwrap().clone();

    let new_schema = NodeSchema::new("Test", "TestCar")
        .with_attribute(AttributeSchema::new("title", "Text"));
    let migration = SchemaMigration::attribute_name_update(
        SchemaPath::field("TestCar", "title"),
        new_schema,
        car_schema(),
    )
    .unwrap();
    assert!(
        migration.execute(&fx.store, &fx.registry, &branch1, Some(minutes(-10))).await.success()
    );

    // branch1 resolves the new name, main still resolves the old one.
    assert_eq!(fx.attribute_node("branch1", minutes(0), car, "name").await, None);
    assert!(fx.attribute_node("branch1", minutes(0), car, "title").await.is_some());
    assert!(fx.attribute_node("main", minutes(0), car, "name").await.is_some());
    assert_eq!(fx.attribute_node("main", minutes(0), car, "title").await, None);

    // main's records were not ended — they are shadowed by parallel
    // deleted-status records on branch1.
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let records = fx
        .store
        .edges_of(&tx, car, Direction::Outgoing, &[EdgeKind::HasAttribute])
        .await
        .unwrap();
    assert!(records.iter().filter(|r| r.branch == "main").all(|r| r.is_open()));
    assert!(records
        .iter()
        .any(|r| r.branch == "branch1" && r.status == EdgeStatus::Deleted));
}

// ============================================================================
// 7. Kind update preserves the uuid and re-points the edges (P9)
// ============================================================================

#[tokio::test]
async fn test_node_kind_update_preserves_uuid() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();

    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let old_node = fx.store.get_node(&tx, car).await.unwrap().unwrap();
    let old_edges = ops::active_incident_edges(
        &fx.store,
        &tx,
        &fx.filter("main", minutes(-30)),
        car,
        EdgeKind::node_kinds(),
    )
    .await
    .unwrap();
    drop(tx);

    let migration = SchemaMigration::node_kind_update(
        SchemaPath::kind_only("TestVehicle"),
        NodeSchema::new("Test", "TestVehicle"),
        car_schema(),
    )
    .unwrap();
    assert!(
        migration.execute(&fx.store, &fx.registry, &main, Some(minutes(-10))).await.success()
    );

    let filter = fx.filter("main", minutes(0));
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();

    // The old kind is gone, the new kind is live, identity survived.
    assert!(ops::active_nodes_of_kind(&fx.store, &tx, &filter, "TestCar").await.unwrap().is_empty());
    let vehicles = ops::active_nodes_of_kind(&fx.store, &tx, &filter, "TestVehicle").await.unwrap();
    assert_eq!(vehicles.len(), 1);
    let new_node = &vehicles[0];
    assert_eq!(new_node.uuid, old_node.uuid);
    assert_ne!(new_node.id, old_node.id);

    // Every previously-active edge has a counterpart on the new record.
    let new_edges = ops::active_incident_edges(
        &fx.store,
        &tx,
        &filter,
        new_node.id,
        EdgeKind::node_kinds(),
    )
    .await
    .unwrap();
    assert_eq!(new_edges.len(), old_edges.len());
    for old_edge in &old_edges {
        assert!(new_edges.iter().any(|e| e.kind == old_edge.kind));
    }

    // The old node's records were ended on the acting branch.
    let old_records = fx
        .store
        .edges_of(&tx, car, Direction::Both, &[])
        .await
        .unwrap();
    assert!(old_records.iter().filter(|r| r.branch == "main").all(|r| !r.is_open()));

    // The attribute still resolves through the re-labeled node.
    drop(tx);
    assert_eq!(
        fx.attribute_value("main", minutes(0), new_node.id, "name").await,
        Some(Value::from("one"))
    );
}

// ============================================================================
// 8. Node removal tears everything down on the acting branch
// ============================================================================

#[tokio::test]
async fn test_node_remove_teardown() {
    let fx = Fixture::new();
    fx.create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();

    let migration =
        SchemaMigration::node_remove(SchemaPath::kind_only("TestCar"), car_schema()).unwrap();
    assert!(
        migration.execute(&fx.store, &fx.registry, &main, Some(minutes(-10))).await.success()
    );

    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let now_filter = fx.filter("main", minutes(0));
    assert!(ops::active_nodes_of_kind(&fx.store, &tx, &now_filter, "TestCar")
        .await
        .unwrap()
        .is_empty());

    // Time travel to before the removal still finds it.
    let before_filter = fx.filter("main", minutes(-20));
    assert_eq!(
        ops::active_nodes_of_kind(&fx.store, &tx, &before_filter, "TestCar")
            .await
            .unwrap()
            .len(),
        1
    );
}

// ============================================================================
// 9. A failing query rolls back the whole migration (P4)
// ============================================================================

struct FailingQuery {
    stats: QueryStats,
}

#[async_trait]
impl Query<MemoryStore> for FailingQuery {
    fn name(&self) -> &'static str {
        "failing_query"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, _store: &MemoryStore, _tx: &mut <MemoryStore as GraphStore>::Tx) -> branchgraph::Result<()> {
        Err(Error::Migration("injected failure".into()))
    }

    fn stats(&self) -> &QueryStats {
        &self.stats
    }
}

#[tokio::test]
async fn test_second_query_failure_rolls_back_first_query() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();
    let filter = fx.filter("main", minutes(-30));

    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    let nodes_before = fx.store.node_count(&tx).await.unwrap();
    let edges_before = fx.store.edge_count(&tx).await.unwrap();
    drop(tx);

    use branchgraph::migrations::schema::NodeAttributeAddQuery;
    let mut queries: Vec<Box<dyn Query<MemoryStore>>> = vec![
        Box::new(NodeAttributeAddQuery::new(
            "TestCar".into(),
            AttributeSchema::new("nbr_doors", "Number").with_default(json!(4)),
            main.clone(),
            filter,
            minutes(-30),
        )),
        Box::new(FailingQuery { stats: QueryStats::default() }),
    ];
    let result = execute_queries(&fx.store, &mut queries).await;

    assert!(!result.success());
    assert_eq!(result.errors, vec!["Migration error: injected failure".to_string()]);

    // Nothing the first query created survived the rollback.
    assert_eq!(fx.attribute_value("main", minutes(0), car, "nbr_doors").await, None);
    let tx = fx.store.begin_tx(TxMode::ReadOnly).await.unwrap();
    assert_eq!(fx.store.node_count(&tx).await.unwrap(), nodes_before);
    assert_eq!(fx.store.edge_count(&tx).await.unwrap(), edges_before);
}

// ============================================================================
// 10. Failures are isolated per migration
// ============================================================================

#[tokio::test]
async fn test_failure_does_not_touch_committed_migrations() {
    let fx = Fixture::new();
    let car = fx
        .create_node_with_attributes("main", minutes(-60), "TestCar", &[("name", json!("one"))])
        .await;
    let main = fx.registry.get_branch("main").unwrap().clone();

    let add = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "nbr_doors"),
        car_schema_with_doors(),
    )
    .unwrap();
    assert!(add.execute(&fx.store, &fx.registry, &main, Some(minutes(-30))).await.success());

    let mut queries: Vec<Box<dyn Query<MemoryStore>>> =
        vec![Box::new(FailingQuery { stats: QueryStats::default() })];
    assert!(!execute_queries(&fx.store, &mut queries).await.success());

    // The committed migration's writes are untouched.
    assert_eq!(
        fx.attribute_value("main", minutes(0), car, "nbr_doors").await,
        Some(Value::Int(4))
    );
}

// ============================================================================
// 11. Malformed migrations fail at construction, before any I/O
// ============================================================================

#[test]
fn test_schema_path_errors_are_eager() {
    // Unknown attribute on the schema.
    let err = SchemaMigration::node_attribute_add(
        SchemaPath::field("TestCar", "does_not_exist"),
        car_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::SchemaPath(_)));

    // Missing field name entirely.
    let err = SchemaMigration::node_attribute_remove(
        SchemaPath::kind_only("TestCar"),
        car_schema(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("field_name is not defined"));
}
