//! `ProjectionEngine`: turns incoming events into bucket mutations.
//!
//! # Overview
//!
//! The engine is the write side of the projection system. For each event
//! it resolves the applicable definitions from the registry and, for every
//! (definition, period) pair, folds the event into the right bucket via an
//! upsert-or-merge against the store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Trigger   │ (ingestion endpoint, outbox poller, consumer, ...)
//! └──────┬──────┘
//!        │ RecordedEvent
//!        ▼
//! ┌─────────────────┐     definitions_for(source)    ┌──────────────────┐
//! │ProjectionEngine │ ◄───────────────────────────── │DefinitionRegistry│
//! └────┬────────────┘                                └──────────────────┘
//!      │ conditional upsert per (definition, period)
//!      ▼
//! ┌─────────────┐
//! │ BucketStore │
//! └─────────────┘
//! ```
//!
//! # Concurrency
//!
//! Merges within one bucket tuple are linearizable: the engine re-reads
//! current content, merges, and writes conditionally on the version it
//! read. A losing writer gets `Conflict` back and retries against the
//! fresh content, so no update is ever lost. Different tuples never
//! contend: there is no global lock, and the engine caches no bucket
//! state across calls.
//!
//! # Example
//!
//! ```ignore
//! let engine = ProjectionEngine::new(registry, store);
//!
//! // Wherever the host detects a new event:
//! engine.apply(&event).await?;
//! ```

use rollup_core::error::{ProjectionError, Result};
use rollup_core::store::{BucketStore, BucketWrite};
use rollup_core::{BucketKey, Period, ProjectionDefinition, RecordedEvent};
use rollup_core::definition::DefinitionRegistry;
use std::sync::Arc;

/// Applies events to aggregated buckets, one conditional upsert per
/// (definition, period) pair.
///
/// The engine is invoked synchronously by whatever triggers aggregation;
/// it performs no scheduling of its own and holds no mutable state, so it
/// can be cloned and shared freely.
#[derive(Clone)]
pub struct ProjectionEngine {
    registry: Arc<DefinitionRegistry>,
    store: Arc<dyn BucketStore>,
}

impl ProjectionEngine {
    /// Create an engine over a frozen registry and a bucket store.
    #[must_use]
    pub fn new(registry: Arc<DefinitionRegistry>, store: Arc<dyn BucketStore>) -> Self {
        Self { registry, store }
    }

    /// Fold one event into every applicable (definition, period) bucket.
    ///
    /// Exactly one bucket is created or mutated per (definition, period)
    /// pair. Events whose source matches no definition are a no-op. The
    /// first failing pair aborts the remaining pairs; buckets already
    /// updated by earlier pairs stay updated (per-pair atomicity, nothing
    /// wider).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::MergeFailed`] when a definition's merge
    /// function fails (that bucket is left untouched) and propagates
    /// store errors unchanged.
    pub async fn apply(&self, event: &RecordedEvent) -> Result<()> {
        let definitions = self.registry.definitions_for(&event.source);
        if definitions.is_empty() {
            tracing::trace!(source = %event.source, "No definitions for event source");
            return Ok(());
        }

        for definition in definitions {
            for period in definition.periods() {
                self.apply_to_bucket(definition, *period, event).await?;
            }
        }
        Ok(())
    }

    /// Apply a batch of events in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event, as [`ProjectionEngine::apply`].
    pub async fn apply_all(&self, events: &[RecordedEvent]) -> Result<()> {
        for event in events {
            self.apply(event).await?;
        }
        Ok(())
    }

    /// Upsert-or-merge one event into one bucket, retrying lost
    /// conditional-write races against fresh content.
    async fn apply_to_bucket(
        &self,
        definition: &ProjectionDefinition,
        period: Period,
        event: &RecordedEvent,
    ) -> Result<()> {
        let key = definition.key_for(event);
        let bucket_key = BucketKey::new(
            definition.name(),
            period,
            key,
            period.aligned_start(event.recorded_at),
        );

        loop {
            let existing = self.store.find(&bucket_key).await?;
            let (current, expected_version) = match &existing {
                Some(bucket) => (&bucket.content, Some(bucket.version)),
                None => (definition.seed(), None),
            };

            let merged = definition.merge(current, event).map_err(|e| {
                tracing::error!(
                    name = definition.name(),
                    period = %period,
                    error = %e,
                    "Merge function failed; bucket left unchanged"
                );
                ProjectionError::MergeFailed {
                    name: definition.name().to_string(),
                    period: period.to_string(),
                    reason: e.to_string(),
                }
            })?;

            let write = BucketWrite {
                key: bucket_key.clone(),
                content: merged,
                source_id: event.source_id.clone(),
                expected_version,
            };

            match self.store.upsert(write).await {
                Ok(bucket) => {
                    tracing::debug!(
                        name = definition.name(),
                        period = %period,
                        key = bucket.key.as_deref().unwrap_or("-"),
                        start_date = %bucket.start_date,
                        version = bucket.version,
                        "Bucket upserted"
                    );
                    return Ok(());
                }
                Err(ProjectionError::Conflict { .. }) => {
                    // Lost the race; merge again against whatever won.
                    tracing::debug!(
                        name = definition.name(),
                        period = %period,
                        start_date = %bucket_key.start_date,
                        "Conditional write conflicted, retrying merge"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
