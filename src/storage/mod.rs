//! # Storage Backend Trait
//!
//! This is THE contract between the engine and any storage engine. The
//! upsert, traversal and batch engines only ever talk to a backend through
//! it and never branch on which backend they hold.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory, snapshot reads, full upsert/traversal support |
//! | `SqliteBackend` | `sqlite` | SQLite file or in-memory DB (feature `sqlite`), raw SQL, no constraints |
//!
//! ## Atomicity
//!
//! `merge_entity` and `merge_relationship` are the conditional
//! find-or-create-or-merge primitives. A backend must execute each one
//! atomically with respect to concurrent callers: two identical merges
//! racing each other must converge on one record. The engine adds no
//! locking of its own.

pub mod memory;
pub mod walk;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cancel::CancelToken;
use crate::model::*;
use crate::schema::{ConstraintType, IndexType, SchemaItem};
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
pub use walk::{Hop, Walk, WalkSource, WalkSpec};

// ============================================================================
// Merge outcome
// ============================================================================

/// Result of a conditional create-or-merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    pub record: T,
    /// True when no matching record existed and one was created.
    pub created: bool,
}

// ============================================================================
// Backend capabilities
// ============================================================================

/// What a backend can do beyond the required contract.
///
/// All fields default to false. Backends override via `capabilities()`.
#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    pub supports_raw_queries: bool,
    pub supports_indexes: bool,
    pub supports_constraints: bool,
    pub persistent: bool,
}

// ============================================================================
// Raw query result
// ============================================================================

/// Rows returned by a backend-native query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<PropertyMap>,
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Optional operations have default bodies that return
/// `Error::Backend("... not supported")`, so a partial backend only
/// implements what it can actually do.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction. Read-only transactions pin a snapshot.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Entity CRUD
    // ========================================================================

    /// Create an entity unconditionally.
    async fn create_entity(
        &self,
        tx: &mut Self::Tx,
        labels: &LabelSet,
        props: PropertyMap,
    ) -> Result<EntityId>;

    /// Get an entity by ID. Returns None if not found.
    async fn get_entity(&self, tx: &Self::Tx, id: EntityId) -> Result<Option<Entity>>;

    /// Merge `props` into an existing entity and refresh `lastModifiedAt`.
    async fn update_entity(
        &self,
        tx: &mut Self::Tx,
        id: EntityId,
        props: PropertyMap,
    ) -> Result<Entity>;

    /// Delete an entity. Returns true if it existed.
    /// Fails if the entity still has relationships.
    async fn delete_entity(&self, tx: &mut Self::Tx, id: EntityId) -> Result<bool>;

    /// Delete an entity and all its relationships.
    ///
    /// Default: get all relationships, delete each, then delete the entity.
    async fn detach_delete_entity(&self, tx: &mut Self::Tx, id: EntityId) -> Result<bool> {
        let rels = self.get_relationships(tx, id, Direction::Both, None).await?;
        for rel in &rels {
            self.delete_relationship(tx, rel.id).await?;
        }
        self.delete_entity(tx, id).await
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two existing entities.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: EntityId,
        dst: EntityId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// Get a relationship by ID.
    async fn get_relationship(&self, tx: &Self::Tx, id: RelId) -> Result<Option<Relationship>>;

    /// Merge `props` into an existing relationship and refresh `lastModifiedAt`.
    async fn update_relationship(
        &self,
        tx: &mut Self::Tx,
        id: RelId,
        props: PropertyMap,
    ) -> Result<Relationship>;

    /// Delete a relationship. Returns true if it existed.
    async fn delete_relationship(&self, tx: &mut Self::Tx, id: RelId) -> Result<bool>;

    // ========================================================================
    // Lookup
    // ========================================================================

    /// All entities satisfying the locator (see [`Entity::matches`]),
    /// ordered by id.
    async fn find_entities(&self, tx: &Self::Tx, locator: &EntityLocator) -> Result<Vec<Entity>>;

    /// Relationships of an entity, optionally filtered by direction and type.
    async fn get_relationships(
        &self,
        tx: &Self::Tx,
        entity: EntityId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Conditional upsert
    // ========================================================================

    /// Find the entity matching `locator` and merge `props` into it, or
    /// create it with `locator.labels` and `props`. Atomic.
    ///
    /// Fails with `AmbiguousMatch` when more than one entity matches.
    async fn merge_entity(
        &self,
        tx: &mut Self::Tx,
        locator: &EntityLocator,
        props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Entity>>;

    /// Resolve both endpoints, then find the `(start)-[rel_type]->(end)`
    /// relationship and merge `props` into it, or create it. Atomic.
    ///
    /// Fails with `NotFound` if either endpoint is missing; endpoints are
    /// never created implicitly.
    async fn merge_relationship(
        &self,
        tx: &mut Self::Tx,
        start: &EntityLocator,
        end: &EntityLocator,
        rel_type: &str,
        props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Relationship>>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Bounded breadth-first walk from `origin`, against one consistent
    /// snapshot.
    ///
    /// Engines resolve `origin` through `find_entities` on the same `tx`
    /// first. A backend whose read-only transactions do not pin a snapshot
    /// across calls must re-read the origin here and fail with `NotFound` if
    /// it has disappeared in between.
    async fn walk(
        &self,
        tx: &Self::Tx,
        origin: EntityId,
        spec: &WalkSpec,
        cancel: &CancelToken,
    ) -> Result<Walk>;

    // ========================================================================
    // Schema
    // ========================================================================

    /// Create an index on a label+property combination.
    async fn create_index(&self, label: &str, property: &str, index_type: IndexType) -> Result<()>;

    /// Drop an index.
    async fn drop_index(&self, label: &str, property: &str) -> Result<()>;

    /// Create a schema constraint.
    ///
    /// Default returns "not supported".
    async fn create_constraint(
        &self,
        _label: &str,
        _property: &str,
        _constraint_type: ConstraintType,
    ) -> Result<()> {
        Err(Error::Backend("constraints not supported".into()))
    }

    /// Schema items defined so far.
    async fn schema(&self) -> Result<Vec<SchemaItem>> {
        Ok(Vec::new())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Total number of entities.
    async fn entity_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// All distinct labels in the graph, sorted.
    async fn labels(&self, tx: &Self::Tx) -> Result<Vec<String>>;

    /// All distinct relationship types in the graph, sorted.
    async fn relationship_types(&self, tx: &Self::Tx) -> Result<Vec<String>>;

    // ========================================================================
    // Escape hatch
    // ========================================================================

    /// Pass-through for backend-native queries with named parameters.
    async fn execute_raw(
        &self,
        _tx: &Self::Tx,
        _query: &str,
        _params: PropertyMap,
    ) -> Result<QueryRows> {
        Err(Error::Backend("raw query execution not supported".into()))
    }

    // ========================================================================
    // Capability negotiation
    // ========================================================================

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }
}

/// Pick the single match out of a candidate list, shared by backends so the
/// ambiguity policy is identical everywhere.
pub(crate) fn single_match(
    locator: &EntityLocator,
    mut candidates: Vec<Entity>,
) -> Result<Option<Entity>> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(Error::AmbiguousMatch {
            locator: locator.to_string(),
            candidates: candidates.iter().map(|e| e.id).collect(),
        }),
    }
}

/// Resolve a relationship endpoint or fail with `NotFound`.
pub(crate) fn required_endpoint(
    role: &str,
    locator: &EntityLocator,
    candidates: Vec<Entity>,
) -> Result<Entity> {
    single_match(locator, candidates)?
        .ok_or_else(|| Error::NotFound(format!("{role} entity {locator}")))
}
