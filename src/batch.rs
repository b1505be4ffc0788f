//! Batch coordinator: many upserts, each isolated from the others.
//!
//! Items run concurrently up to `GraphConfig::batch_concurrency` and each
//! gets its own transaction, so a failure at one index never rolls back or
//! blocks another. Results are slotted by input position, whatever order
//! they complete in.

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::storage::StorageBackend;
use crate::upsert::{self, EntityInput, EntityUpsert, RelationshipInput, RelationshipUpsert};
use crate::{Error, Result};

/// One batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UpsertInput {
    Entity(EntityInput),
    Relationship(RelationshipInput),
}

/// What a successful batch item produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UpsertOutput {
    Entity(EntityUpsert),
    Relationship(RelationshipUpsert),
}

/// Outcome of a batch. `results[i]` and `errors[i]` both describe input `i`;
/// exactly one of them is `Some`.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<Option<UpsertOutput>>,
    pub errors: Vec<Option<Error>>,
    /// Set when every item failed (`BatchFailed`) or the batch was cancelled.
    pub aggregate: Option<Error>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }

    pub fn error(&self, index: usize) -> Option<&Error> {
        self.errors.get(index)?.as_ref()
    }

    pub fn entity(&self, index: usize) -> Option<&EntityUpsert> {
        match self.results.get(index)? {
            Some(UpsertOutput::Entity(e)) => Some(e),
            _ => None,
        }
    }

    pub fn relationship(&self, index: usize) -> Option<&RelationshipUpsert> {
        match self.results.get(index)? {
            Some(UpsertOutput::Relationship(r)) => Some(r),
            _ => None,
        }
    }
}

async fn apply_one<B: StorageBackend>(
    backend: &B,
    input: &UpsertInput,
    cancel: &CancelToken,
) -> Result<UpsertOutput> {
    match input {
        UpsertInput::Entity(e) => {
            upsert::find_or_create_entity(backend, e, cancel).await.map(UpsertOutput::Entity)
        }
        UpsertInput::Relationship(r) => {
            upsert::find_or_create_relationship(backend, r, cancel).await.map(UpsertOutput::Relationship)
        }
    }
}

/// Apply every input independently.
///
/// On cancellation the items that already finished keep their results, the
/// rest get `Error::Cancelled`, and the aggregate is `Error::Cancelled`.
#[tracing::instrument(skip_all, fields(items = inputs.len()))]
pub async fn apply_batch<B: StorageBackend>(
    backend: &B,
    config: &GraphConfig,
    inputs: Vec<UpsertInput>,
    cancel: &CancelToken,
) -> BatchReport {
    let total = inputs.len();
    let mut results: Vec<Option<UpsertOutput>> = (0..total).map(|_| None).collect();
    let mut errors: Vec<Option<Error>> = (0..total).map(|_| None).collect();
    let mut finished = vec![false; total];

    let mut pending = futures::stream::iter(inputs.into_iter().enumerate())
        .map(move |(index, input)| async move { (index, apply_one(backend, &input, cancel).await) })
        .buffer_unordered(config.batch_concurrency.max(1));

    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A token that fires after the last item finished abandons nothing.
                cancelled = finished.contains(&false);
                break;
            }
            next = pending.next() => match next {
                Some((index, Ok(output))) => {
                    finished[index] = true;
                    results[index] = Some(output);
                }
                Some((index, Err(e))) => {
                    tracing::warn!(index, error = %e, "batch item failed");
                    finished[index] = true;
                    errors[index] = Some(e);
                }
                None => break,
            }
        }
    }
    // Abandon whatever is still in flight.
    drop(pending);

    if cancelled {
        for (slot, done) in errors.iter_mut().zip(&finished) {
            if !done {
                *slot = Some(Error::cancelled());
            }
        }
    }

    let report = BatchReport {
        aggregate: if cancelled {
            Some(Error::cancelled())
        } else if total > 0 && errors.iter().all(Option::is_some) {
            Some(Error::BatchFailed { failed: total })
        } else {
            None
        },
        results,
        errors,
    };
    tracing::info!(
        total,
        succeeded = report.succeeded(),
        failed = report.failed(),
        cancelled,
        "batch applied"
    );
    report
}
