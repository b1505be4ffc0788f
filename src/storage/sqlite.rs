//! SQLite storage backend (feature `sqlite`).
//!
//! A partial backend: everything the upsert and traversal engines need,
//! plus raw read-only SQL and property expression indexes. Constraints are
//! not supported.
//!
//! ## Layout
//!
//! ```text
//! entities(id, labels JSON, properties JSON)
//! entity_labels(entity_id, label)            -- label lookup
//! relationships(id, src, dst, rel_type, properties JSON)
//!   UNIQUE(src, dst, rel_type)
//! ```
//!
//! Property bags are stored in the tagged `Value` encoding so integers,
//! floats and timestamps come back as the same variant.
//!
//! ## Limitations
//!
//! - One connection behind a mutex. Every primitive (each merge, each whole
//!   walk) runs under the lock inside one SQLite transaction, which is what
//!   makes merges atomic and walks consistent.
//! - Transactions are markers: `commit_tx`/`rollback_tx` are no-ops and a
//!   read-only transaction does not pin a snapshot across calls. `walk`
//!   re-reads its origin, so an entity deleted after it was resolved is
//!   reported as `NotFound` rather than walked.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::walk::{self, Walk, WalkSource, WalkSpec};
use super::{BackendCapabilities, Merged, QueryRows, StorageBackend, required_endpoint, single_match};
use crate::cancel::CancelToken;
use crate::model::bookkeeping;
use crate::model::*;
use crate::schema::{IndexType, SchemaItem, SchemaKind};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS entities (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        labels     TEXT NOT NULL,
        properties TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS entity_labels (
        entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        label     TEXT NOT NULL,
        PRIMARY KEY (entity_id, label)
    );
    CREATE TABLE IF NOT EXISTS relationships (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        src        INTEGER NOT NULL REFERENCES entities(id),
        dst        INTEGER NOT NULL REFERENCES entities(id),
        rel_type   TEXT NOT NULL,
        properties TEXT NOT NULL,
        UNIQUE (src, dst, rel_type)
    );
    CREATE INDEX IF NOT EXISTS idx_entity_labels_label ON entity_labels(label);
    CREATE INDEX IF NOT EXISTS idx_relationships_src ON relationships(src);
    CREATE INDEX IF NOT EXISTS idx_relationships_dst ON relationships(dst);
"#;

// ============================================================================
// SqliteBackend
// ============================================================================

#[derive(Clone)]
pub struct SqliteBackend {
    inner: Arc<SqliteInner>,
}

struct SqliteInner {
    conn: Mutex<Connection>,
    schema: RwLock<Vec<SchemaItem>>,
    next_tx_id: AtomicU64,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Arc::new(SqliteInner {
                conn: Mutex::new(conn),
                schema: RwLock::new(Vec::new()),
                next_tx_id: AtomicU64::new(0),
            }),
        })
    }

    fn writable(tx: &SqliteTx) -> Result<()> {
        if tx.mode == TxMode::ReadOnly {
            return Err(Error::Backend(format!("write attempted in read-only transaction {}", tx.id)));
        }
        Ok(())
    }
}

/// Marker transaction; see the module limitations.
pub struct SqliteTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for SqliteTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// Row mapping and statements (connection already locked)
// ============================================================================

fn encode(props: &PropertyMap) -> Result<String> {
    Ok(serde_json::to_string(props)?)
}

fn decode(text: &str) -> Result<PropertyMap> {
    Ok(serde_json::from_str(text)?)
}

struct EntityRow {
    id: i64,
    labels: String,
    properties: String,
}

impl EntityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get(0)?, labels: row.get(1)?, properties: row.get(2)? })
    }

    fn into_entity(self) -> Result<Entity> {
        let labels: Vec<String> = serde_json::from_str(&self.labels)?;
        Ok(Entity {
            id: EntityId(self.id as u64),
            labels: LabelSet::from(labels),
            properties: decode(&self.properties)?,
        })
    }
}

struct RelRow {
    id: i64,
    src: i64,
    dst: i64,
    rel_type: String,
    properties: String,
}

impl RelRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            src: row.get(1)?,
            dst: row.get(2)?,
            rel_type: row.get(3)?,
            properties: row.get(4)?,
        })
    }

    fn into_relationship(self) -> Result<Relationship> {
        Ok(Relationship {
            id: RelId(self.id as u64),
            src: EntityId(self.src as u64),
            dst: EntityId(self.dst as u64),
            rel_type: self.rel_type,
            properties: decode(&self.properties)?,
        })
    }
}

const REL_COLUMNS: &str = "id, src, dst, rel_type, properties";

/// JSON path of a property's value inside the tagged encoding, for keys
/// that are safe to splice into SQL.
fn property_path(key: &str) -> Option<String> {
    let safe = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    safe.then(|| format!("$.\"{key}\".value"))
}

fn select_entity(conn: &Connection, id: EntityId) -> Result<Option<Entity>> {
    let row = conn
        .query_row(
            "SELECT id, labels, properties FROM entities WHERE id = ?1",
            params![id.0 as i64],
            EntityRow::read,
        )
        .optional()?;
    row.map(EntityRow::into_entity).transpose()
}

fn select_relationship(conn: &Connection, id: RelId) -> Result<Option<Relationship>> {
    let row = conn
        .query_row(
            &format!("SELECT {REL_COLUMNS} FROM relationships WHERE id = ?1"),
            params![id.0 as i64],
            RelRow::read,
        )
        .optional()?;
    row.map(RelRow::into_relationship).transpose()
}

/// Candidates by first label, narrowed in SQL on string and integer
/// identifying properties, then checked exactly with `Entity::matches`.
fn find_matching(conn: &Connection, locator: &EntityLocator) -> Result<Vec<Entity>> {
    let Some(label) = locator.labels.first() else { return Ok(Vec::new()) };

    let mut sql = String::from(
        "SELECT e.id, e.labels, e.properties FROM entities e \
         JOIN entity_labels l ON l.entity_id = e.id WHERE l.label = ?1",
    );
    let mut args: Vec<SqlValue> = vec![SqlValue::Text(label.to_owned())];
    for (key, value) in &locator.identifying_properties {
        let Some(path) = property_path(key) else { continue };
        let arg = match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Int(i) => SqlValue::Integer(*i),
            _ => continue,
        };
        args.push(arg);
        sql.push_str(&format!(" AND json_extract(e.properties, '{path}') = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY e.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args), EntityRow::read)?;
    let mut found = Vec::new();
    for row in rows {
        let entity = row?.into_entity()?;
        if entity.matches(locator) {
            found.push(entity);
        }
    }
    Ok(found)
}

fn insert_entity(conn: &Connection, labels: &LabelSet, props: &PropertyMap) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO entities (labels, properties) VALUES (?1, ?2)",
        params![serde_json::to_string(&labels.to_vec())?, encode(props)?],
    )?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn.prepare("INSERT INTO entity_labels (entity_id, label) VALUES (?1, ?2)")?;
    for label in labels.iter() {
        stmt.execute(params![id, label])?;
    }
    Ok(EntityId(id as u64))
}

fn update_properties(conn: &Connection, table: &str, id: u64, props: &PropertyMap) -> Result<()> {
    conn.execute(
        &format!("UPDATE {table} SET properties = ?1 WHERE id = ?2"),
        params![encode(props)?, id as i64],
    )?;
    Ok(())
}

fn insert_relationship(
    conn: &Connection,
    src: EntityId,
    dst: EntityId,
    rel_type: &str,
    props: &PropertyMap,
) -> Result<RelId> {
    for (role, id) in [("source", src), ("target", dst)] {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1)",
            params![id.0 as i64],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound(format!("{role} entity {id}")));
        }
    }
    conn.execute(
        "INSERT INTO relationships (src, dst, rel_type, properties) VALUES (?1, ?2, ?3, ?4)",
        params![src.0 as i64, dst.0 as i64, rel_type, encode(props)?],
    )?;
    Ok(RelId(conn.last_insert_rowid() as u64))
}

fn find_edge(conn: &Connection, src: EntityId, dst: EntityId, rel_type: &str) -> Result<Option<Relationship>> {
    let row = conn
        .query_row(
            &format!("SELECT {REL_COLUMNS} FROM relationships WHERE src = ?1 AND dst = ?2 AND rel_type = ?3"),
            params![src.0 as i64, dst.0 as i64, rel_type],
            RelRow::read,
        )
        .optional()?;
    row.map(RelRow::into_relationship).transpose()
}

fn select_relationships(
    conn: &Connection,
    entity: EntityId,
    dir: Direction,
    rel_type: Option<&str>,
) -> Result<Vec<Relationship>> {
    let ends = match dir {
        Direction::Outgoing => "src = ?1",
        Direction::Incoming => "dst = ?1",
        Direction::Both => "(src = ?1 OR dst = ?1)",
    };
    let sql = format!(
        "SELECT {REL_COLUMNS} FROM relationships WHERE {ends} AND (?2 IS NULL OR rel_type = ?2) ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![entity.0 as i64, rel_type], RelRow::read)?;
    rows.map(|row| row?.into_relationship()).collect()
}

/// Walk source over a connection the caller holds locked.
struct LockedView<'a> {
    conn: &'a Connection,
}

impl WalkSource for LockedView<'_> {
    fn entity(&self, id: EntityId) -> Result<Option<Entity>> {
        select_entity(self.conn, id)
    }

    fn edges(&self, id: EntityId, dir: Direction) -> Result<Vec<Relationship>> {
        select_relationships(self.conn, id, dir, None)
    }
}

// ============================================================================
// Raw query value conversion
// ============================================================================

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::DateTime(dt) => SqlValue::Text(dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Value::List(_) | Value::Map(_) => SqlValue::Text(value.to_json().to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::List(b.iter().map(|byte| Value::Int(i64::from(*byte))).collect()),
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for SqliteBackend {
    type Tx = SqliteTx;

    async fn shutdown(&self) -> Result<()> {
        self.inner.conn.lock().execute_batch("PRAGMA optimize;")?;
        Ok(())
    }

    async fn begin_tx(&self, mode: TxMode) -> Result<SqliteTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        Ok(SqliteTx { id, mode })
    }

    async fn commit_tx(&self, _tx: SqliteTx) -> Result<()> { Ok(()) }

    async fn rollback_tx(&self, _tx: SqliteTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Entity CRUD
    // ========================================================================

    async fn create_entity(
        &self,
        tx: &mut SqliteTx,
        labels: &LabelSet,
        mut props: PropertyMap,
    ) -> Result<EntityId> {
        Self::writable(tx)?;
        bookkeeping::stamp_created(&mut props, Utc::now());
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;
        let id = insert_entity(&txn, labels, &props)?;
        txn.commit()?;
        Ok(id)
    }

    async fn get_entity(&self, _tx: &SqliteTx, id: EntityId) -> Result<Option<Entity>> {
        select_entity(&self.inner.conn.lock(), id)
    }

    async fn update_entity(
        &self,
        tx: &mut SqliteTx,
        id: EntityId,
        props: PropertyMap,
    ) -> Result<Entity> {
        Self::writable(tx)?;
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;
        let mut entity = select_entity(&txn, id)?
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
        bookkeeping::merge_touched(&mut entity.properties, props, Utc::now());
        update_properties(&txn, "entities", id.0, &entity.properties)?;
        txn.commit()?;
        Ok(entity)
    }

    async fn delete_entity(&self, tx: &mut SqliteTx, id: EntityId) -> Result<bool> {
        Self::writable(tx)?;
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;
        let rels: i64 = txn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE src = ?1 OR dst = ?1",
            params![id.0 as i64],
            |row| row.get(0),
        )?;
        if rels > 0 {
            return Err(Error::Backend(format!(
                "cannot delete entity {id} with {rels} relationships; delete relationships first"
            )));
        }
        let removed = txn.execute("DELETE FROM entities WHERE id = ?1", params![id.0 as i64])?;
        txn.commit()?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        tx: &mut SqliteTx,
        src: EntityId,
        dst: EntityId,
        rel_type: &str,
        mut props: PropertyMap,
    ) -> Result<RelId> {
        Self::writable(tx)?;
        bookkeeping::stamp_created(&mut props, Utc::now());
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;
        let id = insert_relationship(&txn, src, dst, rel_type, &props)?;
        txn.commit()?;
        Ok(id)
    }

    async fn get_relationship(&self, _tx: &SqliteTx, id: RelId) -> Result<Option<Relationship>> {
        select_relationship(&self.inner.conn.lock(), id)
    }

    async fn update_relationship(
        &self,
        tx: &mut SqliteTx,
        id: RelId,
        props: PropertyMap,
    ) -> Result<Relationship> {
        Self::writable(tx)?;
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;
        let mut rel = select_relationship(&txn, id)?
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        bookkeeping::merge_touched(&mut rel.properties, props, Utc::now());
        update_properties(&txn, "relationships", id.0, &rel.properties)?;
        txn.commit()?;
        Ok(rel)
    }

    async fn delete_relationship(&self, tx: &mut SqliteTx, id: RelId) -> Result<bool> {
        Self::writable(tx)?;
        let removed = self
            .inner
            .conn
            .lock()
            .execute("DELETE FROM relationships WHERE id = ?1", params![id.0 as i64])?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    async fn find_entities(&self, _tx: &SqliteTx, locator: &EntityLocator) -> Result<Vec<Entity>> {
        find_matching(&self.inner.conn.lock(), locator)
    }

    async fn get_relationships(
        &self,
        _tx: &SqliteTx,
        entity: EntityId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        select_relationships(&self.inner.conn.lock(), entity, dir, rel_type)
    }

    // ========================================================================
    // Conditional upsert
    // ========================================================================

    async fn merge_entity(
        &self,
        tx: &mut SqliteTx,
        locator: &EntityLocator,
        mut props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Entity>> {
        Self::writable(tx)?;
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;

        let merged = match single_match(locator, find_matching(&txn, locator)?)? {
            Some(mut entity) => {
                bookkeeping::merge_touched(&mut entity.properties, props, now);
                update_properties(&txn, "entities", entity.id.0, &entity.properties)?;
                Merged { record: entity, created: false }
            }
            None => {
                bookkeeping::stamp_created(&mut props, now);
                let id = insert_entity(&txn, &locator.labels, &props)?;
                let entity = Entity { id, labels: locator.labels.clone(), properties: props };
                Merged { record: entity, created: true }
            }
        };
        txn.commit()?;
        Ok(merged)
    }

    async fn merge_relationship(
        &self,
        tx: &mut SqliteTx,
        start: &EntityLocator,
        end: &EntityLocator,
        rel_type: &str,
        mut props: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Merged<Relationship>> {
        Self::writable(tx)?;
        let mut conn = self.inner.conn.lock();
        let txn = conn.transaction()?;

        let src = required_endpoint("start", start, find_matching(&txn, start)?)?.id;
        let dst = required_endpoint("end", end, find_matching(&txn, end)?)?.id;

        let merged = match find_edge(&txn, src, dst, rel_type)? {
            Some(mut rel) => {
                bookkeeping::merge_touched(&mut rel.properties, props, now);
                update_properties(&txn, "relationships", rel.id.0, &rel.properties)?;
                Merged { record: rel, created: false }
            }
            None => {
                bookkeeping::stamp_created(&mut props, now);
                let id = insert_relationship(&txn, src, dst, rel_type, &props)?;
                let rel = Relationship { id, src, dst, rel_type: rel_type.to_owned(), properties: props };
                Merged { record: rel, created: true }
            }
        };
        txn.commit()?;
        Ok(merged)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn walk(
        &self,
        _tx: &SqliteTx,
        origin: EntityId,
        spec: &WalkSpec,
        cancel: &CancelToken,
    ) -> Result<Walk> {
        let mut conn = self.inner.conn.lock();
        // Read transaction: the whole walk sees one database state.
        let txn = conn.transaction()?;
        let result = walk::walk(&LockedView { conn: &txn }, origin, spec, cancel)?;
        txn.commit()?;
        Ok(result)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    async fn create_index(&self, label: &str, property: &str, index_type: IndexType) -> Result<()> {
        if index_type == IndexType::FullText {
            return Err(Error::Backend("full-text indexes not supported".into()));
        }
        let path = property_path(property).ok_or_else(|| {
            Error::Validation(format!("property '{property}' cannot be indexed; use [A-Za-z0-9_] keys"))
        })?;
        self.inner.conn.lock().execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_prop_{property} ON entities(json_extract(properties, '{path}'));"
        ))?;

        let item = SchemaItem::index(label, property, index_type);
        let mut schema = self.inner.schema.write();
        if !schema.contains(&item) {
            schema.push(item);
        }
        Ok(())
    }

    async fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        let mut schema = self.inner.schema.write();
        schema.retain(|item| {
            !(item.label == label && item.property == property && matches!(item.kind, SchemaKind::Index(_)))
        });
        // The expression index is shared by every label; drop it with the last user.
        if property_path(property).is_some() && !schema.iter().any(|item| item.property == property) {
            self.inner
                .conn
                .lock()
                .execute_batch(&format!("DROP INDEX IF EXISTS idx_prop_{property};"))?;
        }
        Ok(())
    }

    async fn schema(&self) -> Result<Vec<SchemaItem>> {
        Ok(self.inner.schema.read().clone())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    async fn entity_count(&self, _tx: &SqliteTx) -> Result<u64> {
        let n: i64 = self.inner.conn.lock().query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    async fn relationship_count(&self, _tx: &SqliteTx) -> Result<u64> {
        let n: i64 =
            self.inner.conn.lock().query_row("SELECT COUNT(*) FROM relationships", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    async fn labels(&self, _tx: &SqliteTx) -> Result<Vec<String>> {
        let conn = self.inner.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT label FROM entity_labels ORDER BY label")?;
        let labels = stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(labels)
    }

    async fn relationship_types(&self, _tx: &SqliteTx) -> Result<Vec<String>> {
        let conn = self.inner.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT rel_type FROM relationships ORDER BY rel_type")?;
        let types = stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(types)
    }

    // ========================================================================
    // Escape hatch
    // ========================================================================

    /// Read-only SQL. Parameters bind by name: `{"path": ..}` fills `:path`.
    async fn execute_raw(&self, _tx: &SqliteTx, query: &str, params: PropertyMap) -> Result<QueryRows> {
        let conn = self.inner.conn.lock();
        let mut stmt = conn.prepare(query)?;
        if !stmt.readonly() {
            return Err(Error::Validation("raw queries must be read-only".into()));
        }

        for (name, value) in &params {
            let placeholder = format!(":{name}");
            let index = stmt
                .parameter_index(&placeholder)?
                .ok_or_else(|| Error::Validation(format!("query has no parameter {placeholder}")))?;
            stmt.raw_bind_parameter(index, to_sql(value))?;
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
        let mut out = QueryRows { columns, rows: Vec::new() };
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut record = PropertyMap::new();
            for (i, column) in out.columns.iter().enumerate() {
                record.insert(column.clone(), from_sql(row.get_ref(i)?));
            }
            out.rows.push(record);
        }
        Ok(out)
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_raw_queries: true,
            supports_indexes: true,
            supports_constraints: false,
            persistent: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
