//! # archgraph — Idempotent Upsert and Traversal for Architecture Graphs
//!
//! Lets analysis agents populate and query a property graph of software
//! architecture (files, functions, components, dependencies) incrementally,
//! without creating duplicates and without speaking the store's query
//! language.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the engines and storage
//! 2. **Clean DTOs**: `Entity`, `Relationship`, `Value` cross all boundaries
//! 3. **Stateless engines**: atomicity lives in the backend's merge primitives
//! 4. **Snapshot reads**: every traversal observes one consistent view
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archgraph::{CancelToken, EntityInput, EntityLocator, Graph, props};
//!
//! # async fn example() -> archgraph::Result<()> {
//! let graph = Graph::open_memory().await?;
//! let cancel = CancelToken::new();
//!
//! let input = EntityInput::new(["Function", "Go"], props([("filePath", "/a.go"), ("name", "Foo")]))
//!     .with_property("signature", "func Foo()");
//! let foo = graph.find_or_create_entity(&input, &cancel).await?;
//!
//! let locator = EntityLocator::new(["Function"], props([("name", "Foo")]));
//! let deps = graph.find_dependencies(&locator, 2, &[], &cancel).await?;
//! println!("{} has {} dependencies", foo.entity.id, deps.results.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | In-memory graph with snapshot reads |
//! | SQLite | `sqlite` | File or in-memory SQLite database via rusqlite |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod schema;
pub mod upsert;
pub mod traversal;
pub mod batch;
pub mod export;
pub mod cancel;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Entity, EntityId, EntityLocator, LabelSet, Relationship, RelId,
    Direction, Value, PropertyMap, Bookkeeping, props,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{
    StorageBackend, BackendCapabilities, MemoryBackend, Merged, QueryRows,
};
#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
pub use schema::{ConstraintType, IndexType, SchemaItem};

// ============================================================================
// Re-exports: Transactions, engines
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};
pub use upsert::{EntityInput, RelationshipInput, EntityUpsert, RelationshipUpsert};
pub use traversal::{
    DependencyDirection, DependencyResult, Neighbor, NeighborResult,
    Subgraph, SubgraphEdge, SubgraphNode,
};
pub use batch::{BatchReport, UpsertInput, UpsertOutput};
pub use cancel::CancelToken;
pub use config::GraphConfig;

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and exposes
/// the upsert, traversal and batch operations over it.
///
/// The handle holds no state besides its configuration, so it can be shared
/// freely (`Graph<B>` is `Sync` whenever `B` is).
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: GraphConfig,
}

/// Entity and relationship counts, plus the vocabulary in use.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub entities: u64,
    pub relationships: u64,
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self { backend, config: GraphConfig::default() }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ========================================================================
    // Upsert
    // ========================================================================

    /// Find the entity named by `input`'s locator and merge into it, or create it.
    pub async fn find_or_create_entity(
        &self,
        input: &EntityInput,
        cancel: &CancelToken,
    ) -> Result<EntityUpsert> {
        upsert::find_or_create_entity(&self.backend, input, cancel).await
    }

    /// Find or create the relationship between two existing entities.
    pub async fn find_or_create_relationship(
        &self,
        input: &RelationshipInput,
        cancel: &CancelToken,
    ) -> Result<RelationshipUpsert> {
        upsert::find_or_create_relationship(&self.backend, input, cancel).await
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub async fn get_entity_details(
        &self,
        locator: &EntityLocator,
        cancel: &CancelToken,
    ) -> Result<Entity> {
        traversal::get_entity_details(&self.backend, locator, cancel).await
    }

    /// Entities within `max_depth` hops in either direction.
    pub async fn find_neighbors(
        &self,
        locator: &EntityLocator,
        max_depth: i64,
        cancel: &CancelToken,
    ) -> Result<NeighborResult> {
        traversal::find_neighbors(&self.backend, &self.config, locator, max_depth, cancel).await
    }

    /// What `locator` depends on, following outgoing edges. An empty
    /// `rel_types` follows every type.
    pub async fn find_dependencies(
        &self,
        locator: &EntityLocator,
        max_depth: i64,
        rel_types: &[String],
        cancel: &CancelToken,
    ) -> Result<DependencyResult> {
        traversal::find_dependencies(&self.backend, &self.config, locator, max_depth, rel_types, cancel)
            .await
    }

    /// What depends on `locator`, following incoming edges.
    pub async fn find_dependents(
        &self,
        locator: &EntityLocator,
        max_depth: i64,
        rel_types: &[String],
        cancel: &CancelToken,
    ) -> Result<DependencyResult> {
        traversal::find_dependents(&self.backend, &self.config, locator, max_depth, rel_types, cancel)
            .await
    }

    /// Diagram-ready nodes and edges around `locator`.
    pub async fn get_entity_subgraph(
        &self,
        locator: &EntityLocator,
        max_depth: i64,
        cancel: &CancelToken,
    ) -> Result<Subgraph> {
        traversal::get_entity_subgraph(&self.backend, &self.config, locator, max_depth, cancel).await
    }

    // ========================================================================
    // Batch
    // ========================================================================

    /// Apply many upserts with per-item failure isolation.
    pub async fn apply_batch(&self, inputs: Vec<UpsertInput>, cancel: &CancelToken) -> BatchReport {
        batch::apply_batch(&self.backend, &self.config, inputs, cancel).await
    }

    pub async fn upsert_entities(&self, inputs: Vec<EntityInput>, cancel: &CancelToken) -> BatchReport {
        self.apply_batch(inputs.into_iter().map(UpsertInput::Entity).collect(), cancel).await
    }

    pub async fn upsert_relationships(
        &self,
        inputs: Vec<RelationshipInput>,
        cancel: &CancelToken,
    ) -> BatchReport {
        self.apply_batch(inputs.into_iter().map(UpsertInput::Relationship).collect(), cancel).await
    }

    // ========================================================================
    // Pass-throughs
    // ========================================================================

    /// Run a backend-native read query with named parameters.
    pub async fn execute_raw(&self, query: &str, params: PropertyMap) -> Result<QueryRows> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let result = self.backend.execute_raw(&tx, query, params).await;
        self.backend.commit_tx(tx).await?;
        result
    }

    /// Define indexes and constraints. Stops at the first item the backend rejects.
    pub async fn define_schema(&self, items: &[SchemaItem]) -> Result<()> {
        for item in items {
            match item.kind {
                schema::SchemaKind::Index(index_type) => {
                    self.backend.create_index(&item.label, &item.property, index_type).await?
                }
                schema::SchemaKind::Constraint(constraint_type) => {
                    self.backend
                        .create_constraint(&item.label, &item.property, constraint_type)
                        .await?
                }
            }
            tracing::debug!(label = %item.label, property = %item.property, kind = ?item.kind, "schema item defined");
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let stats = GraphStats {
            entities: self.backend.entity_count(&tx).await?,
            relationships: self.backend.relationship_count(&tx).await?,
            labels: self.backend.labels(&tx).await?,
            relationship_types: self.backend.relationship_types(&tx).await?,
        };
        self.backend.commit_tx(tx).await?;
        Ok(stats)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Ok(Self::with_backend(backend))
    }
}

#[cfg(feature = "sqlite")]
impl Graph<storage::SqliteBackend> {
    /// Open (or create) a SQLite database file.
    pub async fn open_sqlite(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let backend = storage::SqliteBackend::open(path)?;
        Ok(Self::with_backend(backend))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// What a cancelled operation had already produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Partial {
    Neighbors(NeighborResult),
    Dependencies(DependencyResult),
    Subgraph(Subgraph),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous match: {locator} matches {} entities", candidates.len())]
    AmbiguousMatch { locator: String, candidates: Vec<EntityId> },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Cancelled")]
    Cancelled { partial: Option<Box<Partial>> },

    #[error("Batch failed: all {failed} items failed")]
    BatchFailed { failed: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Cancellation with nothing to hand back.
    pub fn cancelled() -> Self {
        Error::Cancelled { partial: None }
    }

    /// Results collected before a cancellation, if any.
    pub fn partial(&self) -> Option<&Partial> {
        match self {
            Error::Cancelled { partial } => partial.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Backend(format!("serialization: {e}"))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Backend(format!("sqlite: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
