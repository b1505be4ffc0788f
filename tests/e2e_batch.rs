//! End-to-end tests for batched upserts: positional results, per-item
//! isolation, aggregate errors and cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};

use archgraph::storage::memory::MemoryTx;
use archgraph::storage::{Walk, WalkSpec};
use archgraph::{
    CancelToken, Direction, Entity, EntityId, EntityInput, EntityLocator, Error, Graph,
    GraphConfig, IndexType, LabelSet, MemoryBackend, Merged, PropertyMap, RelId, Relationship,
    RelationshipInput, Result, StorageBackend, TxMode, UpsertInput, UpsertOutput, props,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

fn component(name: &str) -> EntityInput {
    EntityInput::new(["Component"], props([("name", name)]))
}

fn component_ref(name: &str) -> EntityLocator {
    EntityLocator::new(["Component"], props([("name", name)]))
}

#[tokio::test]
async fn test_failure_at_index_two_is_isolated() {
    let graph = Graph::open_memory().await.unwrap();
    let inputs = vec![
        component("api"),
        component("db"),
        EntityInput::new(Vec::<String>::new(), props([("name", "broken")])),
        component("cache"),
        component("queue"),
    ];

    let report = graph.upsert_entities(inputs, &CancelToken::new()).await;

    assert_eq!(report.results.len(), 5);
    assert_eq!(report.errors.len(), 5);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.error(2), Some(Error::Validation(_))));
    assert!(report.results[2].is_none());
    for i in [0, 1, 3, 4] {
        assert!(report.error(i).is_none());
        assert!(report.entity(i).unwrap().created);
    }
    assert!(report.aggregate.is_none());
    assert_eq!(graph.stats().await.unwrap().entities, 4);
}

#[tokio::test]
async fn test_positions_hold_under_concurrency() {
    let graph = Graph::open_memory()
        .await
        .unwrap()
        .with_config(GraphConfig { batch_concurrency: 4, ..GraphConfig::default() })
        .unwrap();
    let names: Vec<String> = (0..40).map(|i| format!("svc-{i}")).collect();
    let inputs = names.iter().map(|n| component(n)).collect();

    let report = graph.upsert_entities(inputs, &CancelToken::new()).await;

    assert_eq!(report.succeeded(), 40);
    for (i, name) in names.iter().enumerate() {
        let got = report.entity(i).unwrap().entity.get("name").and_then(|v| v.as_str()).unwrap();
        assert_eq!(got, name);
    }
}

#[tokio::test]
async fn test_mixed_batch_with_missing_endpoint() {
    let graph = Graph::open_memory().await.unwrap();
    let cancel = CancelToken::new();
    graph.upsert_entities(vec![component("api"), component("db")], &cancel).await;

    let inputs = vec![
        UpsertInput::Relationship(RelationshipInput::new(component_ref("api"), "DEPENDS_ON", component_ref("db"))),
        UpsertInput::Relationship(RelationshipInput::new(component_ref("api"), "DEPENDS_ON", component_ref("ghost"))),
        UpsertInput::Entity(component("ghost")),
    ];
    let report = graph.apply_batch(inputs, &cancel).await;

    assert!(matches!(report.results[0], Some(UpsertOutput::Relationship(_))));
    assert!(matches!(report.error(1), Some(Error::NotFound(_)) | None));
    assert!(matches!(report.results[2], Some(UpsertOutput::Entity(_))));
    assert!(report.aggregate.is_none());
}

#[tokio::test]
async fn test_all_failures_raise_aggregate() {
    let graph = Graph::open_memory().await.unwrap();
    let missing = RelationshipInput::new(component_ref("a"), "DEPENDS_ON", component_ref("b"));

    let report = graph.upsert_relationships(vec![missing.clone(), missing], &CancelToken::new()).await;

    assert_eq!(report.failed(), 2);
    assert!(matches!(report.aggregate, Some(Error::BatchFailed { failed: 2 })));
}

#[tokio::test]
async fn test_repeated_batch_is_idempotent() {
    let graph = Graph::open_memory().await.unwrap();
    let cancel = CancelToken::new();
    let batch = || vec![component("api"), component("db"), component("api")];

    let first = graph.upsert_entities(batch(), &cancel).await;
    let second = graph.upsert_entities(batch(), &cancel).await;

    assert_eq!(first.failed(), 0);
    for i in 0..3 {
        assert_eq!(first.entity(i).unwrap().entity.id, second.entity(i).unwrap().entity.id);
        assert!(!second.entity(i).unwrap().created);
    }
    assert_eq!(graph.stats().await.unwrap().entities, 2);
}

#[tokio::test]
async fn test_cancelled_batch() {
    let graph = Graph::open_memory().await.unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = graph.upsert_entities(vec![component("a"), component("b")], &cancel).await;

    assert_eq!(report.len(), 2);
    assert!(report.errors.iter().all(|e| e.as_ref().is_some_and(Error::is_cancelled)));
    assert!(report.aggregate.as_ref().is_some_and(Error::is_cancelled));
    assert_eq!(graph.stats().await.unwrap().entities, 0);
}

/// Delegates to MemoryBackend and fires the cancel token right after the
/// `trip_at`-th entity merge has been applied.
struct CancelOnMerge {
    inner: MemoryBackend,
    cancel: CancelToken,
    trip_at: usize,
    merges: AtomicUsize,
}

impl CancelOnMerge {
    fn new(cancel: &CancelToken, trip_at: usize) -> Self {
        Self { inner: MemoryBackend::new(), cancel: cancel.clone(), trip_at, merges: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl StorageBackend for CancelOnMerge {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> { self.inner.shutdown().await }
    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> { self.inner.begin_tx(mode).await }
    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> { self.inner.commit_tx(tx).await }
    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> { self.inner.rollback_tx(tx).await }

    async fn create_entity(&self, tx: &mut MemoryTx, labels: &LabelSet, props: PropertyMap) -> Result<EntityId> {
        self.inner.create_entity(tx, labels, props).await
    }
    async fn get_entity(&self, tx: &MemoryTx, id: EntityId) -> Result<Option<Entity>> {
        self.inner.get_entity(tx, id).await
    }
    async fn update_entity(&self, tx: &mut MemoryTx, id: EntityId, props: PropertyMap) -> Result<Entity> {
        self.inner.update_entity(tx, id, props).await
    }
    async fn delete_entity(&self, tx: &mut MemoryTx, id: EntityId) -> Result<bool> {
        self.inner.delete_entity(tx, id).await
    }
    async fn create_relationship(
        &self, tx: &mut MemoryTx, src: EntityId, dst: EntityId, rel_type: &str, props: PropertyMap,
    ) -> Result<RelId> {
        self.inner.create_relationship(tx, src, dst, rel_type, props).await
    }
    async fn get_relationship(&self, tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        self.inner.get_relationship(tx, id).await
    }
    async fn update_relationship(&self, tx: &mut MemoryTx, id: RelId, props: PropertyMap) -> Result<Relationship> {
        self.inner.update_relationship(tx, id, props).await
    }
    async fn delete_relationship(&self, tx: &mut MemoryTx, id: RelId) -> Result<bool> {
        self.inner.delete_relationship(tx, id).await
    }
    async fn find_entities(&self, tx: &MemoryTx, locator: &EntityLocator) -> Result<Vec<Entity>> {
        self.inner.find_entities(tx, locator).await
    }
    async fn get_relationships(
        &self, tx: &MemoryTx, entity: EntityId, dir: Direction, rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        self.inner.get_relationships(tx, entity, dir, rel_type).await
    }
    async fn merge_entity(
        &self, tx: &mut MemoryTx, locator: &EntityLocator, props: PropertyMap, now: DateTime<Utc>,
    ) -> Result<Merged<Entity>> {
        let merged = self.inner.merge_entity(tx, locator, props, now).await;
        if self.merges.fetch_add(1, Ordering::SeqCst) + 1 == self.trip_at {
            self.cancel.cancel();
        }
        merged
    }
    async fn merge_relationship(
        &self, tx: &mut MemoryTx, start: &EntityLocator, end: &EntityLocator, rel_type: &str,
        props: PropertyMap, now: DateTime<Utc>,
    ) -> Result<Merged<Relationship>> {
        self.inner.merge_relationship(tx, start, end, rel_type, props, now).await
    }
    async fn walk(&self, tx: &MemoryTx, origin: EntityId, spec: &WalkSpec, cancel: &CancelToken) -> Result<Walk> {
        self.inner.walk(tx, origin, spec, cancel).await
    }
    async fn create_index(&self, label: &str, property: &str, index_type: IndexType) -> Result<()> {
        self.inner.create_index(label, property, index_type).await
    }
    async fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        self.inner.drop_index(label, property).await
    }
    async fn entity_count(&self, tx: &MemoryTx) -> Result<u64> { self.inner.entity_count(tx).await }
    async fn relationship_count(&self, tx: &MemoryTx) -> Result<u64> { self.inner.relationship_count(tx).await }
    async fn labels(&self, tx: &MemoryTx) -> Result<Vec<String>> { self.inner.labels(tx).await }
    async fn relationship_types(&self, tx: &MemoryTx) -> Result<Vec<String>> {
        self.inner.relationship_types(tx).await
    }
}

fn sequential<B: StorageBackend>(backend: B) -> Graph<B> {
    Graph::with_backend(backend)
        .with_config(GraphConfig { batch_concurrency: 1, ..GraphConfig::default() })
        .unwrap()
}

#[tokio::test]
async fn test_finished_items_survive_cancellation() {
    let cancel = CancelToken::new();
    let graph = sequential(CancelOnMerge::new(&cancel, 2));
    let inputs = ["api", "db", "cache", "queue", "auth"].into_iter().map(component).collect();

    let report = graph.upsert_entities(inputs, &cancel).await;

    assert_eq!(report.len(), 5);
    for i in [0, 1] {
        assert!(matches!(report.results[i], Some(UpsertOutput::Entity(_))));
        assert!(report.error(i).is_none());
    }
    for i in 2..5 {
        assert!(report.results[i].is_none());
        assert!(report.error(i).is_some_and(Error::is_cancelled));
    }
    assert!(report.aggregate.as_ref().is_some_and(Error::is_cancelled));
    assert_eq!(graph.stats().await.unwrap().entities, 2);
}

#[tokio::test]
async fn test_cancel_after_last_item_abandons_nothing() {
    let cancel = CancelToken::new();
    let graph = sequential(CancelOnMerge::new(&cancel, 3));
    let inputs = ["api", "db", "cache"].into_iter().map(component).collect();

    let report = graph.upsert_entities(inputs, &cancel).await;

    assert!(cancel.is_cancelled());
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert!(report.aggregate.is_none());
}
