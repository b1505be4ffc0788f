//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`. The whole graph
//! is one `GraphState` behind a `RwLock<Arc<..>>`:
//!
//! - **Writes** take the write lock and mutate through `Arc::make_mut`, so
//!   each primitive (including the find-or-create merges) is atomic.
//! - **Read-only transactions** clone the `Arc` at `begin_tx` and read that
//!   pinned snapshot until they end. A concurrent writer then pays for one
//!   copy of the graph instead of the reader seeing a half-applied write.
//!
//! ## Limitations
//!
//! - **No rollback**: writes are applied immediately. `rollback_tx()` does
//!   NOT undo mutations made through a read-write transaction.
//! - **No property indexes**: `create_index()` only records the definition.
//!   Locator lookups scan the label index.
//! - **No raw queries**: `execute_raw()` keeps the "not supported" default.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::walk::{self, Walk, WalkSource, WalkSpec};
use super::{BackendCapabilities, Merged, StorageBackend, required_endpoint, single_match};
use crate::cancel::CancelToken;
use crate::model::bookkeeping;
use crate::model::*;
use crate::schema::{ConstraintType, IndexType, SchemaItem, SchemaKind};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: RwLock<Arc<GraphState>>,
    schema: RwLock<Vec<SchemaItem>>,
    next_tx_id: AtomicU64,
}

#[derive(Clone, Default)]
struct GraphState {
    entities: HashMap<EntityId, Entity>,
    relationships: HashMap<RelId, Relationship>,
    /// entity id → relationship ids touching it
    adjacency: HashMap<EntityId, Vec<RelId>>,
    /// label → entity ids (poor man's label index)
    label_index: HashMap<String, Vec<EntityId>>,
    next_entity_id: u64,
    next_rel_id: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot a transaction reads from.
    fn view(&self, tx: &MemoryTx) -> Arc<GraphState> {
        match &tx.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => Arc::clone(&*self.inner.state.read()),
        }
    }

    /// Run `f` against the mutable graph under the write lock.
    fn write<T>(&self, tx: &MemoryTx, f: impl FnOnce(&mut GraphState) -> Result<T>) -> Result<T> {
        if tx.mode == TxMode::ReadOnly {
            return Err(Error::Backend(format!("write attempted in read-only transaction {}", tx.id)));
        }
        let mut guard = self.inner.state.write();
        f(Arc::make_mut(&mut guard))
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction. Read-only transactions pin a snapshot.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    snapshot: Option<Arc<GraphState>>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// GraphState operations (lock already held)
// ============================================================================

impl GraphState {
    fn find(&self, locator: &EntityLocator) -> Vec<Entity> {
        // Scan the smallest label bucket; matches() re-checks the rest.
        let bucket = locator
            .labels
            .iter()
            .filter_map(|l| self.label_index.get(l))
            .min_by_key(|ids| ids.len());
        let Some(ids) = bucket else { return Vec::new() };
        if locator.labels.iter().any(|l| !self.label_index.contains_key(l)) {
            return Vec::new();
        }

        let mut found: Vec<Entity> = ids
            .iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.matches(locator))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    fn insert_entity(&mut self, labels: &LabelSet, props: PropertyMap) -> EntityId {
        self.next_entity_id += 1;
        let id = EntityId(self.next_entity_id);
        for label in labels.iter() {
            self.label_index.entry(label.to_owned()).or_default().push(id);
        }
        self.entities.insert(id, Entity { id, labels: labels.clone(), properties: props });
        self.adjacency.insert(id, Vec::new());
        id
    }

    fn insert_relationship(
        &mut self,
        src: EntityId,
        dst: EntityId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        if !self.entities.contains_key(&src) {
            return Err(Error::NotFound(format!("source entity {src}")));
        }
        if !self.entities.contains_key(&dst) {
            return Err(Error::NotFound(format!("target entity {dst}")));
        }
        if self.find_edge(src, dst, rel_type).is_some() {
            return Err(Error::Backend(format!(
                "relationship ({src})-[:{rel_type}]->({dst}) already exists"
            )));
        }

        self.next_rel_id += 1;
        let id = RelId(self.next_rel_id);
        let rel = Relationship { id, src, dst, rel_type: rel_type.to_owned(), properties: props };
        self.relationships.insert(id, rel);

        // Update adjacency for both endpoints
        self.adjacency.entry(src).or_default().push(id);
        if src != dst {
            self.adjacency.entry(dst).or_default().push(id);
        }
        Ok(id)
    }

    fn find_edge(&self, src: EntityId, dst: EntityId, rel_type: &str) -> Option<RelId> {
        self.adjacency.get(&src)?.iter().copied().find(|rid| {
            self.relationships
                .get(rid)
                .is_some_and(|r| r.src == src && r.dst == dst && r.rel_type == rel_type)
        })
    }

    fn relationships_of(&self, entity: EntityId, dir: Direction, rel_type: Option<&str>) -> Vec<Relationship> {
        let Some(rel_ids) = self.adjacency.get(&entity) else { return Vec::new() };
        rel_ids
            .iter()
            .filter_map(|rid| self.relationships.get(rid))
            .filter(|rel| match dir {
                Direction::Outgoing => rel.src == entity,
                Direction::Incoming => rel.dst == entity,
                Direction::Both => true,
            })
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .cloned()
            .collect()
    }
}

impl WalkSource for GraphState {
    fn entity(&self, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.entities.get(&id).cloned())
    }

    fn edges(&self, id: EntityId, dir: Direction) -> Result<Vec<Relationship>> {
        Ok(self.relationships_of(id, dir, None))
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        let snapshot = match mode {
            TxMode::ReadOnly => Some(Arc::clone(&*self.inner.state.read())),
            TxMode::ReadWrite => None,
        };
        Ok(MemoryTx { id, mode, snapshot })
    }

    /// No-op: memory backend applies writes immediately, not on commit.
    async fn commit_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    /// WARNING: No-op. Mutations applied during this transaction are NOT reverted.
    async fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Entity CRUD
    // ========================================================================

    async fn create_entity(
        &self,
        tx: &mut MemoryTx,
        labels: &LabelSet,
        mut props: PropertyMap,
    ) -> Result<EntityId> {
        bookkeeping::stamp_created(&mut props, Utc::now());
        self.write(tx, |g| Ok(g.insert_entity(labels, props)))
    }

    async fn get_entity(&self, tx: &MemoryTx, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.view(tx).entities.get(&id).cloned())
    }

    async fn update_entity(
        &self,
        tx: &mut MemoryTx,
        id: EntityId,
        props: PropertyMap,
    ) -> Result<Entity> {
        let now = Utc::now();
        self.write(tx, |g| {
            let entity = g.entities.get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
            bookkeeping::merge_touched(&mut entity.properties, props, now);
            Ok(entity.clone())
        })
    }

    async fn delete_entity(&self, tx: &mut MemoryTx, id: EntityId) -> Result<bool> {
        self.write(tx, |g| {
            // Can't delete a connected entity
            if let Some(rels) = g.adjacency.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::Backend(format!(
                        "cannot delete entity {id} with {} relationships; delete relationships first",
                        rels.len()
                    )));
                }
            }

            let removed = g.entities.remove(&id);
            g.adjacency.remove(&id);
            if let Some(entity) = &removed {
                for label in entity.labels.iter() {
                    if let Some(ids) = g.label_index.get_mut(label) {
                        ids.retain(|eid| *eid != id);
                        if ids.is_empty() {
                            g.label_index.remove(label);
                        }
                    }
                }
            }
            Ok(removed.is_some())
        })
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        tx: &mut MemoryTx,
        src: EntityId,
        dst: EntityId,
        rel_type: &str,
        mut props: PropertyMap,
    ) -> Result<RelId> {
        bookkeeping::stamp_created(&mut props, Utc::now());
        self.write(tx, |g| g.insert_relationship(src, dst, rel_type, props))
    }

    async fn get_relationship(&self, tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.view(tx).relationships.get(&id).cloned())
    }

    async fn update_relationship(
        &self,
        tx: &mut MemoryTx,
        id: RelId,
        props: PropertyMap,
    ) -> Result<Relationship> {
        let now = Utc::now();
        self.write(tx, |g| {
            let rel = g.relationships.get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
            bookkeeping::merge_touched(&mut rel.properties, props, now);
            Ok(rel.clone())
        })
    }

    async fn delete_relationship(&self, tx: &mut MemoryTx, id: RelId) -> Result<bool> {
        self.write(tx, |g| {
            let removed = g.relationships.remove(&id);
            if let Some(rel) = &removed {
                for end in [rel.src, rel.dst] {
                    if let Some(rels) = g.adjacency.get_mut(&end) {
                        rels.retain(|rid| *rid != id);
                    }
                }
            }
            Ok(removed.is_some())
        })
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    async fn find_entities(&self, tx: &MemoryTx, locator: &EntityLocator) -> Result<Vec<Entity>> {
        Ok(self.view(tx).find(locator))
    }

    async fn get_relationships(
        &self,
        tx: &MemoryTx,
        entity: EntityId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        Ok(self.view(tx).relationships_of(entity, dir, rel_type))
    }

    // ========================================================================
    // Conditional upsert
    // ========================================================================

    async fn merge_entity(
        &self,
        tx: &mut MemoryTx,
        locator: &EntityLocator,
        mut props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Entity>> {
        self.write(tx, |g| {
            match single_match(locator, g.find(locator))? {
                Some(found) => {
                    let entity = g.entities.get_mut(&found.id)
                        .ok_or_else(|| Error::Backend(format!("label index points at missing entity {}", found.id)))?;
                    bookkeeping::merge_touched(&mut entity.properties, props, now);
                    Ok(Merged { record: entity.clone(), created: false })
                }
                None => {
                    bookkeeping::stamp_created(&mut props, now);
                    let id = g.insert_entity(&locator.labels, props);
                    let entity = g.entities.get(&id).cloned()
                        .ok_or_else(|| Error::Backend(format!("entity {id} vanished after insert")))?;
                    Ok(Merged { record: entity, created: true })
                }
            }
        })
    }

    async fn merge_relationship(
        &self,
        tx: &mut MemoryTx,
        start: &EntityLocator,
        end: &EntityLocator,
        rel_type: &str,
        mut props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Relationship>> {
        self.write(tx, |g| {
            let src = required_endpoint("start", start, g.find(start))?.id;
            let dst = required_endpoint("end", end, g.find(end))?.id;

            match g.find_edge(src, dst, rel_type) {
                Some(rid) => {
                    let rel = g.relationships.get_mut(&rid)
                        .ok_or_else(|| Error::Backend(format!("adjacency points at missing relationship {rid}")))?;
                    bookkeeping::merge_touched(&mut rel.properties, props, now);
                    Ok(Merged { record: rel.clone(), created: false })
                }
                None => {
                    bookkeeping::stamp_created(&mut props, now);
                    let rid = g.insert_relationship(src, dst, rel_type, props)?;
                    let rel = g.relationships.get(&rid).cloned()
                        .ok_or_else(|| Error::Backend(format!("relationship {rid} vanished after insert")))?;
                    Ok(Merged { record: rel, created: true })
                }
            }
        })
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn walk(
        &self,
        tx: &MemoryTx,
        origin: EntityId,
        spec: &WalkSpec,
        cancel: &CancelToken,
    ) -> Result<Walk> {
        let view = self.view(tx);
        walk::walk(view.as_ref(), origin, spec, cancel)
    }

    // ========================================================================
    // Schema (recorded only; lookups always scan)
    // ========================================================================

    async fn create_index(&self, label: &str, property: &str, index_type: IndexType) -> Result<()> {
        self.record_schema(SchemaItem::index(label, property, index_type));
        Ok(())
    }

    async fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        self.inner.schema.write().retain(|item| {
            !(item.label == label
                && item.property == property
                && matches!(item.kind, SchemaKind::Index(_)))
        });
        Ok(())
    }

    async fn create_constraint(
        &self,
        label: &str,
        property: &str,
        constraint_type: ConstraintType,
    ) -> Result<()> {
        self.record_schema(SchemaItem::constraint(label, property, constraint_type));
        Ok(())
    }

    async fn schema(&self) -> Result<Vec<SchemaItem>> {
        Ok(self.inner.schema.read().clone())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    async fn entity_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(self.view(tx).entities.len() as u64)
    }

    async fn relationship_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(self.view(tx).relationships.len() as u64)
    }

    async fn labels(&self, tx: &MemoryTx) -> Result<Vec<String>> {
        let mut labels: Vec<String> = self.view(tx).label_index.keys().cloned().collect();
        labels.sort();
        Ok(labels)
    }

    async fn relationship_types(&self, tx: &MemoryTx) -> Result<Vec<String>> {
        let view = self.view(tx);
        let mut types: Vec<String> = view.relationships.values().map(|r| r.rel_type.clone()).collect();
        types.sort();
        types.dedup();
        Ok(types)
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_raw_queries: false,
            supports_indexes: false,
            supports_constraints: false,
            persistent: false,
        }
    }
}

impl MemoryBackend {
    fn record_schema(&self, item: SchemaItem) {
        let mut schema = self.inner.schema.write();
        if !schema.contains(&item) {
            schema.push(item);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(name: &str) -> EntityLocator {
        EntityLocator::new(["Function"], props([("name", name)]))
    }

    #[tokio::test]
    async fn test_create_and_get_entity() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let id = db.create_entity(&mut tx, &LabelSet::new(["Function"]), props([("name", "Foo")])).await.unwrap();
        let entity = db.get_entity(&tx, id).await.unwrap().unwrap();

        assert!(entity.has_label("Function"));
        assert_eq!(entity.get("name"), Some(&Value::from("Foo")));
        assert!(entity.bookkeeping().created_at.is_some());
    }

    #[tokio::test]
    async fn test_merge_entity_is_idempotent() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let now = Utc::now();

        let first = db.merge_entity(&mut tx, &locator("Foo"), props([("name", "Foo")]), now).await.unwrap();
        let second = db.merge_entity(&mut tx, &locator("Foo"), props([("name", "Foo")]), now).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(db.entity_count(&tx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_merge_entity_reports_ambiguity() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.create_entity(&mut tx, &LabelSet::new(["Function", "Go"]), props([("name", "Foo")])).await.unwrap();
        db.create_entity(&mut tx, &LabelSet::new(["Function", "Rust"]), props([("name", "Foo")])).await.unwrap();

        let err = db.merge_entity(&mut tx, &locator("Foo"), PropertyMap::new(), Utc::now()).await.unwrap_err();
        match err {
            Error::AmbiguousMatch { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected AmbiguousMatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_merge_relationship_requires_endpoints() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.merge_entity(&mut tx, &locator("A"), props([("name", "A")]), Utc::now()).await.unwrap();

        let err = db
            .merge_relationship(&mut tx, &locator("A"), &locator("Missing"), "CALLS", PropertyMap::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_relationship_rejects_parallel_edge() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let labels = LabelSet::new(["Function"]);
        let a = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();
        let b = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();

        db.create_relationship(&mut tx, a, b, "CALLS", PropertyMap::new()).await.unwrap();
        assert!(db.create_relationship(&mut tx, a, b, "CALLS", PropertyMap::new()).await.is_err());
        // a different type, or the reverse direction, is a different edge
        db.create_relationship(&mut tx, a, b, "IMPORTS", PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, b, a, "CALLS", PropertyMap::new()).await.unwrap();
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cannot_delete_connected_entity() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let labels = LabelSet::new(["File"]);

        let a = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();
        let b = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();
        db.create_relationship(&mut tx, a, b, "IMPORTS", PropertyMap::new()).await.unwrap();

        assert!(db.delete_entity(&mut tx, a).await.is_err());

        assert!(db.detach_delete_entity(&mut tx, a).await.unwrap());
        assert!(db.get_entity(&tx, a).await.unwrap().is_none());
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 0);
        assert_eq!(db.labels(&tx).await.unwrap(), vec!["File".to_string()]);
    }

    #[tokio::test]
    async fn test_read_only_tx_sees_snapshot() {
        let db = MemoryBackend::new();
        let mut wtx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.merge_entity(&mut wtx, &locator("A"), props([("name", "A")]), Utc::now()).await.unwrap();

        let rtx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        db.merge_entity(&mut wtx, &locator("B"), props([("name", "B")]), Utc::now()).await.unwrap();

        assert_eq!(db.entity_count(&rtx).await.unwrap(), 1);
        assert_eq!(db.entity_count(&wtx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let err = db.create_entity(&mut tx, &LabelSet::new(["File"]), PropertyMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_update_relationship_merges() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let labels = LabelSet::new(["Function"]);
        let a = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();
        let b = db.create_entity(&mut tx, &labels, PropertyMap::new()).await.unwrap();
        let rid = db.create_relationship(&mut tx, a, b, "CALLS", props([("line", 3)])).await.unwrap();

        let rel = db.update_relationship(&mut tx, rid, props([("count", 2)])).await.unwrap();
        assert_eq!(rel.properties.get("line"), Some(&Value::Int(3)));
        assert_eq!(rel.properties.get("count"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_schema_is_recorded_once() {
        let db = MemoryBackend::new();
        db.create_index("File", "path", IndexType::BTree).await.unwrap();
        db.create_index("File", "path", IndexType::BTree).await.unwrap();
        db.create_constraint("File", "path", ConstraintType::Unique).await.unwrap();
        assert_eq!(db.schema().await.unwrap().len(), 2);

        db.drop_index("File", "path").await.unwrap();
        assert_eq!(db.schema().await.unwrap().len(), 1);
    }
}
