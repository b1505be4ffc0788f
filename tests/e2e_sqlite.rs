//! End-to-end tests for the SQLite backend: the same engine operations,
//! plus persistence, raw queries and schema definition.

#![cfg(feature = "sqlite")]

use archgraph::{
    CancelToken, EntityInput, EntityLocator, Error, Graph, IndexType, RelationshipInput,
    SchemaItem, SqliteBackend, StorageBackend, Value, props,
};
use pretty_assertions::assert_eq;

fn func(name: &str) -> EntityLocator {
    EntityLocator::new(["Function"], props([("name", name)]))
}

fn func_input(name: &str) -> EntityInput {
    EntityInput::new(["Function", "Go"], props([("name", name)]))
}

async fn open() -> Graph<SqliteBackend> {
    Graph::with_backend(SqliteBackend::open_in_memory().unwrap())
}

#[tokio::test]
async fn test_upsert_and_traverse() {
    let graph = open().await;
    let cancel = CancelToken::new();
    graph.upsert_entities(vec![func_input("main"), func_input("parse"), func_input("lex")], &cancel).await;
    graph
        .upsert_relationships(
            vec![
                RelationshipInput::new(func("main"), "CALLS", func("parse")),
                RelationshipInput::new(func("parse"), "CALLS", func("lex")),
            ],
            &cancel,
        )
        .await;

    let deps = graph.find_dependencies(&func("main"), 3, &[], &cancel).await.unwrap();
    let names: Vec<&str> = deps.results.iter().filter_map(|n| n.entity.get("name")?.as_str()).collect();
    assert_eq!(names, vec!["parse", "lex"]);

    let dependents = graph.find_dependents(&func("lex"), 1, &[], &cancel).await.unwrap();
    assert_eq!(dependents.results.len(), 1);
    assert_eq!(dependents.results[0].rel_type, "CALLS");
}

#[tokio::test]
async fn test_foo_scenario() {
    let graph = open().await;
    let cancel = CancelToken::new();
    let input = EntityInput::new(["Function", "Go"], props([("filePath", "/a.go"), ("name", "Foo")]))
        .with_property("signature", "func Foo()");

    let e1 = graph.find_or_create_entity(&input, &cancel).await.unwrap();
    let e2 = graph
        .find_or_create_entity(&input.clone().with_property("visibility", "public"), &cancel)
        .await
        .unwrap();

    assert_eq!(e1.entity.id, e2.entity.id);
    assert_eq!(e2.entity.get("signature"), Some(&Value::from("func Foo()")));
    assert_eq!(e2.entity.get("visibility"), Some(&Value::from("public")));
    assert_eq!(e1.entity.bookkeeping().created_at, e2.entity.bookkeeping().created_at);
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("archgraph-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("graph.db");
    let _ = std::fs::remove_file(&path);

    {
        let graph = Graph::open_sqlite(&path).await.unwrap();
        graph.find_or_create_entity(&func_input("main"), &CancelToken::new()).await.unwrap();
        graph.shutdown().await.unwrap();
    }

    let graph = Graph::open_sqlite(&path).await.unwrap();
    let main = graph.get_entity_details(&func("main"), &CancelToken::new()).await.unwrap();
    assert!(main.has_label("Go"));
    assert_eq!(graph.stats().await.unwrap().entities, 1);

    drop(graph);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_raw_query_and_schema() {
    let graph = open().await;
    let cancel = CancelToken::new();
    graph.upsert_entities(vec![func_input("main"), func_input("parse")], &cancel).await;

    graph
        .define_schema(&[SchemaItem::index("Function", "name", IndexType::BTree)])
        .await
        .unwrap();
    assert_eq!(graph.backend().schema().await.unwrap().len(), 1);

    let rows = graph
        .execute_raw(
            "SELECT label, COUNT(*) AS n FROM entity_labels WHERE label = :label GROUP BY label",
            props([("label", "Go")]),
        )
        .await
        .unwrap();
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0].get("n"), Some(&Value::Int(2)));

    // still resolves through the property index
    let found = graph.get_entity_details(&func("parse"), &cancel).await.unwrap();
    assert_eq!(found.get("name"), Some(&Value::from("parse")));
}

#[tokio::test]
async fn test_constraints_are_unsupported() {
    let graph = open().await;
    let err = graph
        .define_schema(&[SchemaItem::constraint("Function", "name", archgraph::ConstraintType::Unique)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
}
