//! Relationship (edge) in the property graph.

use serde::{Deserialize, Serialize};

use super::bookkeeping::Bookkeeping;
use super::{EntityId, PropertyMap, Value, property_map};

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction, relative to the entity a walk is standing on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
            Direction::Both => "both",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Both => Direction::Both,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relationship (directed, typed edge) in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: RelId,
    pub src: EntityId,
    pub dst: EntityId,
    pub rel_type: String,
    #[serde(with = "property_map::plain")]
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: RelId, src: EntityId, dst: EntityId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            src,
            dst,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The "other" end of the relationship from the given entity.
    pub fn other_end(&self, from: EntityId) -> Option<EntityId> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }

    /// Direction of this edge as seen from `from`.
    pub fn direction_from(&self, from: EntityId) -> Direction {
        if from == self.src { Direction::Outgoing } else { Direction::Incoming }
    }

    pub fn bookkeeping(&self) -> Bookkeeping {
        Bookkeeping::read(&self.properties)
    }
}
