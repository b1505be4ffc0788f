//! Upsert engine: idempotent find-or-create-or-merge.
//!
//! The engine validates input, assembles the property bag and hands it to
//! the backend's atomic merge primitive inside a read-write transaction.
//! It keeps no state and takes no locks of its own.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::model::bookkeeping::{self, CONFIDENCE, SOURCE, STATUS, TAGS};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::TxMode;
use crate::{Error, Result};

// ============================================================================
// Inputs
// ============================================================================

/// Optional provenance fields shared by entity and relationship inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Which analyzer produced this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// In `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Provenance {
    fn validate(&self) -> Result<()> {
        if let Some(c) = self.confidence {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(Error::Validation(format!("confidence {c} is outside [0, 1]")));
            }
        }
        Ok(())
    }

    /// Write the present fields into `props`. Absent fields leave whatever
    /// the stored record already has.
    fn apply(&self, props: &mut PropertyMap) {
        if let Some(source) = &self.source {
            props.insert(SOURCE.into(), Value::from(source.as_str()));
        }
        if let Some(confidence) = self.confidence {
            props.insert(CONFIDENCE.into(), Value::Float(confidence));
        }
        if let Some(status) = &self.status {
            props.insert(STATUS.into(), Value::from(status.as_str()));
        }
        if !self.tags.is_empty() {
            props.insert(TAGS.into(), Value::from(self.tags.clone()));
        }
    }
}

/// Arguments to [`find_or_create_entity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    pub labels: LabelSet,
    #[serde(with = "property_map::plain")]
    pub identifying_properties: PropertyMap,
    #[serde(default, with = "property_map::plain")]
    pub properties: PropertyMap,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl EntityInput {
    pub fn new(
        labels: impl IntoIterator<Item = impl Into<String>>,
        identifying_properties: PropertyMap,
    ) -> Self {
        Self {
            labels: LabelSet::new(labels),
            identifying_properties,
            properties: PropertyMap::new(),
            provenance: Provenance::default(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        merge_into(&mut self.properties, properties);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.provenance.source = Some(source.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.provenance.confidence = Some(confidence);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.provenance.status = Some(status.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.provenance.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn locator(&self) -> EntityLocator {
        EntityLocator {
            labels: self.labels.clone(),
            identifying_properties: self.identifying_properties.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.locator().validate("entity")?;
        self.provenance.validate()?;

        // The stored bag must still satisfy the locator after it is assembled.
        let mut provenance = PropertyMap::new();
        self.provenance.apply(&mut provenance);
        for (key, value) in &self.identifying_properties {
            if bookkeeping::TIMESTAMP_KEYS.contains(&key.as_str()) {
                return Err(Error::Validation(format!(
                    "'{key}' is maintained by the engine and cannot identify an entity"
                )));
            }
            let overrides = [self.properties.get(key), provenance.get(key)];
            if let Some(other) = overrides.into_iter().flatten().find(|other| *other != value) {
                return Err(Error::Validation(format!(
                    "property '{key}' is {other} but identifies the entity as {value}"
                )));
            }
        }
        Ok(())
    }

    /// Identifying properties, then the property bag, then provenance.
    fn property_bag(&self) -> PropertyMap {
        let mut bag = self.identifying_properties.clone();
        merge_into(&mut bag, self.properties.clone());
        self.provenance.apply(&mut bag);
        strip_reserved(&mut bag, "entity");
        bag
    }
}

/// Arguments to [`find_or_create_relationship`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipInput {
    pub start: EntityLocator,
    pub end: EntityLocator,
    pub rel_type: String,
    #[serde(default, with = "property_map::plain")]
    pub properties: PropertyMap,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl RelationshipInput {
    pub fn new(start: EntityLocator, rel_type: impl Into<String>, end: EntityLocator) -> Self {
        Self {
            start,
            end,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
            provenance: Provenance::default(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.provenance.source = Some(source.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.provenance.confidence = Some(confidence);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.start.validate("start")?;
        self.end.validate("end")?;
        if self.rel_type.trim().is_empty() {
            return Err(Error::Validation("relationship type is empty".into()));
        }
        self.provenance.validate()
    }

    fn property_bag(&self) -> PropertyMap {
        let mut bag = self.properties.clone();
        self.provenance.apply(&mut bag);
        strip_reserved(&mut bag, "relationship");
        bag
    }
}

fn strip_reserved(bag: &mut PropertyMap, kind: &str) {
    let stripped = bookkeeping::strip_timestamps(bag);
    if !stripped.is_empty() {
        tracing::warn!(kind, keys = ?stripped, "ignoring caller-supplied timestamps");
    }
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpsert {
    pub entity: Entity,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpsert {
    pub relationship: Relationship,
    pub created: bool,
}

// ============================================================================
// Operations
// ============================================================================

/// Find the entity `input` locates and merge `input`'s properties into it,
/// or create it. Repeating the call with the same input converges on the
/// same entity and only moves `lastModifiedAt` forward.
#[tracing::instrument(skip_all, fields(labels = %input.labels))]
pub async fn find_or_create_entity<B: StorageBackend>(
    backend: &B,
    input: &EntityInput,
    cancel: &CancelToken,
) -> Result<EntityUpsert> {
    cancel.check()?;
    input.validate()?;

    let locator = input.locator();
    let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
    match backend.merge_entity(&mut tx, &locator, input.property_bag(), Utc::now()).await {
        Ok(merged) => {
            backend.commit_tx(tx).await?;
            tracing::debug!(id = %merged.record.id, created = merged.created, "entity upserted");
            Ok(EntityUpsert { entity: merged.record, created: merged.created })
        }
        Err(e) => {
            rollback(backend, tx).await;
            Err(e)
        }
    }
}

/// Resolve both endpoints, then find or create the typed edge between them.
/// Endpoints are never created here; a missing one is `NotFound`.
#[tracing::instrument(skip_all, fields(rel_type = %input.rel_type))]
pub async fn find_or_create_relationship<B: StorageBackend>(
    backend: &B,
    input: &RelationshipInput,
    cancel: &CancelToken,
) -> Result<RelationshipUpsert> {
    cancel.check()?;
    input.validate()?;

    let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
    let merged = backend
        .merge_relationship(
            &mut tx,
            &input.start,
            &input.end,
            &input.rel_type,
            input.property_bag(),
            Utc::now(),
        )
        .await;
    match merged {
        Ok(merged) => {
            backend.commit_tx(tx).await?;
            tracing::debug!(id = %merged.record.id, created = merged.created, "relationship upserted");
            Ok(RelationshipUpsert { relationship: merged.record, created: merged.created })
        }
        Err(e) => {
            rollback(backend, tx).await;
            Err(e)
        }
    }
}

async fn rollback<B: StorageBackend>(backend: &B, tx: B::Tx) {
    if let Err(e) = backend.rollback_tx(tx).await {
        tracing::warn!(error = %e, "rollback failed");
    }
}
