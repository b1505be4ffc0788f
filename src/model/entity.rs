//! Entity (node) in the property graph.

use serde::{Deserialize, Serialize};

use super::bookkeeping::Bookkeeping;
use super::{EntityLocator, LabelSet, PropertyMap, Value, property_map};

/// Opaque, stable entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity: a labeled node carrying a property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub labels: LabelSet,
    #[serde(with = "property_map::plain")]
    pub properties: PropertyMap,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            labels: LabelSet::default(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = LabelSet::new(labels);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Does this entity satisfy the locator? It must carry every locator
    /// label, and every identifying property must be present with an equal
    /// value of the same type.
    pub fn matches(&self, locator: &EntityLocator) -> bool {
        self.labels.is_superset(&locator.labels)
            && locator
                .identifying_properties
                .iter()
                .all(|(k, v)| self.properties.get(k) == Some(v))
    }

    /// Typed view of the bookkeeping fields.
    pub fn bookkeeping(&self) -> Bookkeeping {
        Bookkeeping::read(&self.properties)
    }
}
