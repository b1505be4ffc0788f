//! Subgraph extraction shaped for diagrams.
//!
//! Node ids are `e<N>` and edge ids `r<N>`, built from the stable entity and
//! relationship ids. Only a fixed set of display keys is carried over, and
//! only their scalar values, so backend bookkeeping never leaks into a
//! rendered diagram.

use serde::{Deserialize, Serialize};

use super::resolve_and_walk;
use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::model::{Direction, Entity, EntityId, EntityLocator, PropertyMap, RelId, Relationship, property_map};
use crate::storage::StorageBackend;
use crate::{Error, Partial, Result};

/// Property keys a diagram shows.
pub const DISPLAY_KEYS: &[&str] = &[
    "name", "filePath", "path", "kind", "language", "signature",
    "visibility", "status", "source", "confidence", "line",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphNode {
    pub id: String,
    pub labels: Vec<String>,
    pub caption: String,
    #[serde(with = "property_map::plain")]
    pub properties: PropertyMap,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub center: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(with = "property_map::plain")]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    /// Node id of the center.
    pub center: String,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
    pub depth: u32,
    pub truncated: bool,
}

impl Subgraph {
    pub fn node(&self, id: &str) -> Option<&SubgraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

pub fn node_id(id: EntityId) -> String {
    format!("e{}", id.0)
}

pub fn edge_id(id: RelId) -> String {
    format!("r{}", id.0)
}

fn display_properties(props: &PropertyMap) -> PropertyMap {
    DISPLAY_KEYS
        .iter()
        .filter_map(|&k| props.get(k).filter(|v| v.is_scalar() && !v.is_null()).map(|v| (k.to_owned(), v.clone())))
        .collect()
}

fn to_node(entity: &Entity, center: bool) -> SubgraphNode {
    let caption = match entity.get("name").and_then(|v| v.as_str()) {
        Some(name) => name.to_owned(),
        None => format!("{} {}", entity.labels.first().unwrap_or("Entity"), entity.id),
    };
    SubgraphNode {
        id: node_id(entity.id),
        labels: entity.labels.to_vec(),
        caption,
        properties: display_properties(&entity.properties),
        center,
    }
}

fn to_edge(rel: &Relationship) -> SubgraphEdge {
    SubgraphEdge {
        id: edge_id(rel.id),
        source: node_id(rel.src),
        target: node_id(rel.dst),
        rel_type: rel.rel_type.clone(),
        properties: display_properties(&rel.properties),
    }
}

/// Nodes and edges within `max_depth` hops of `locator`, each once.
#[tracing::instrument(skip_all, fields(locator = %locator, max_depth = max_depth))]
pub async fn get_entity_subgraph<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    locator: &EntityLocator,
    max_depth: i64,
    cancel: &CancelToken,
) -> Result<Subgraph> {
    let (walk, depth) =
        resolve_and_walk(backend, config, locator, max_depth, Direction::Both, &[], cancel).await?;

    let mut nodes = Vec::with_capacity(walk.hops.len() + 1);
    nodes.push(to_node(&walk.origin, true));
    nodes.extend(walk.hops.iter().map(|hop| to_node(&hop.entity, false)));

    let result = Subgraph {
        center: node_id(walk.origin.id),
        nodes,
        edges: walk.edges.iter().map(to_edge).collect(),
        depth,
        truncated: walk.truncated,
    };
    if walk.cancelled {
        return Err(Error::Cancelled { partial: Some(Box::new(Partial::Subgraph(result))) });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Value, props};

    #[test]
    fn test_node_keeps_only_display_scalars() {
        let entity = Entity::new(EntityId(7))
            .with_labels(["Function", "Go"])
            .with_property("name", "Foo")
            .with_property("signature", "func Foo()")
            .with_property("internalHash", "abc")
            .with_property("kind", Value::List(vec![Value::from("x")]))
            .with_property("createdAt", "2024-01-01T00:00:00Z");

        let node = to_node(&entity, false);
        assert_eq!(node.id, "e7");
        assert_eq!(node.caption, "Foo");
        assert_eq!(node.properties, props([("name", "Foo"), ("signature", "func Foo()")]));
    }

    #[test]
    fn test_caption_falls_back_to_label() {
        let entity = Entity::new(EntityId(3)).with_labels(["File"]).with_property("path", "/a.go");
        assert_eq!(to_node(&entity, true).caption, "File 3");
    }

    #[test]
    fn test_edge_serializes_type_field() {
        let rel = Relationship::new(RelId(2), EntityId(1), EntityId(3), "CALLS").with_property("line", 4);
        let json = serde_json::to_value(to_edge(&rel)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "r2", "source": "e1", "target": "e3", "type": "CALLS", "properties": {"line": 4}})
        );
    }
}
