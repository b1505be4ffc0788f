//! Locator: the (labels, identifying properties) lookup key for an entity.

use serde::{Deserialize, Serialize};

use super::{LabelSet, PropertyMap, Value, property_map};
use crate::{Error, Result};

/// Resolves an entity. Not stored anywhere; two upserts with equal locators
/// must land on the same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLocator {
    pub labels: LabelSet,
    #[serde(with = "property_map::plain")]
    pub identifying_properties: PropertyMap,
}

impl EntityLocator {
    pub fn new(
        labels: impl IntoIterator<Item = impl Into<String>>,
        identifying_properties: PropertyMap,
    ) -> Self {
        Self {
            labels: LabelSet::new(labels),
            identifying_properties,
        }
    }

    /// Add one identifying property.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.identifying_properties.insert(key.into(), value.into());
        self
    }

    /// Reject locators that could match arbitrary entities. `role` names the
    /// locator in the error message ("start", "end", "entity").
    pub fn validate(&self, role: &str) -> Result<()> {
        if self.labels.is_empty() {
            return Err(Error::Validation(format!("{role} locator has no labels")));
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Validation(format!("{role} locator has a blank label")));
        }
        if self.identifying_properties.is_empty() {
            return Err(Error::Validation(format!(
                "{role} locator has no identifying properties"
            )));
        }
        if self.identifying_properties.keys().any(|k| k.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "{role} locator has a blank identifying property key"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for EntityLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {{", self.labels)?;
        for (i, (k, v)) in self.identifying_properties.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}})")
    }
}
