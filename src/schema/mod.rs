//! Schema definitions: indexes and constraints on label + property pairs.

use serde::{Deserialize, Serialize};

/// Type of index to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexType {
    /// B-tree index for equality and range lookups.
    BTree,
    /// Full-text search index.
    FullText,
}

/// Type of constraint to create on a label+property pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintType {
    /// Property value must be unique among entities with this label.
    Unique,
    /// Property must exist on all entities with this label.
    Exists,
}

/// What a schema item asks the backend to maintain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "type", rename_all = "camelCase")]
pub enum SchemaKind {
    Index(IndexType),
    Constraint(ConstraintType),
}

/// One schema definition, e.g. "unique `filePath` on `File`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaItem {
    pub label: String,
    pub property: String,
    #[serde(flatten)]
    pub kind: SchemaKind,
}

impl SchemaItem {
    pub fn index(label: impl Into<String>, property: impl Into<String>, index_type: IndexType) -> Self {
        Self { label: label.into(), property: property.into(), kind: SchemaKind::Index(index_type) }
    }

    pub fn constraint(
        label: impl Into<String>,
        property: impl Into<String>,
        constraint_type: ConstraintType,
    ) -> Self {
        Self {
            label: label.into(),
            property: property.into(),
            kind: SchemaKind::Constraint(constraint_type),
        }
    }
}
