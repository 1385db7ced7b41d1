//! Dense, gap-filled time-series materialization.
//!
//! A plain range query only returns buckets that have data. `TimeSeries`
//! instead walks the full bucket grid of a window and synthesizes a
//! placeholder (carrying the definition's seed) for every grid slot with
//! no stored bucket, so consumers always get one segment per slot in
//! ascending order, which is the shape charting and reporting code wants.

use rollup_core::definition::DefinitionRegistry;
use rollup_core::error::{ProjectionError, Result};
use rollup_core::store::BucketStore;
use rollup_core::{Bucket, DateTime, Period, ProjectionQuery, Segment, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Materializes dense time series from stored buckets.
///
/// Needs the registry (for each definition's seed, used as placeholder
/// content) alongside the store.
///
/// # Example
///
/// ```ignore
/// let series = TimeSeries::new(registry, store);
/// let segments = series
///     .materialize("page-views", "5 minutes", start, end)
///     .await?;
/// // One segment per 5-minute slot between start and end, placeholders
/// // included, ascending by start_date.
/// ```
#[derive(Clone)]
pub struct TimeSeries {
    registry: Arc<DefinitionRegistry>,
    store: Arc<dyn BucketStore>,
}

impl TimeSeries {
    /// Create a materializer over a frozen registry and a bucket store.
    #[must_use]
    pub fn new(registry: Arc<DefinitionRegistry>, store: Arc<dyn BucketStore>) -> Self {
        Self { registry, store }
    }

    /// Materialize the unkeyed bucket stream of `name` over
    /// `[start, end]`.
    ///
    /// The grid runs from `aligned(start)` to `aligned(end)` inclusive,
    /// stepping by the period. The output length depends only on the
    /// window, never on how many buckets have data.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnknownDefinition`] when `name` is not
    /// registered (the seed is required for placeholders),
    /// [`ProjectionError::InvalidPeriodExpression`] when the period
    /// expression does not parse, and propagates store errors.
    pub async fn materialize(
        &self,
        name: &str,
        period_expression: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Segment>> {
        self.materialize_inner(name, period_expression, None, start, end)
            .await
    }

    /// Materialize the bucket stream of one partition key.
    ///
    /// # Errors
    ///
    /// As [`TimeSeries::materialize`].
    pub async fn materialize_for_key(
        &self,
        name: &str,
        period_expression: &str,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Segment>> {
        self.materialize_inner(name, period_expression, Some(key), start, end)
            .await
    }

    async fn materialize_inner(
        &self,
        name: &str,
        period_expression: &str,
        key: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Segment>> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| ProjectionError::UnknownDefinition {
                name: name.to_string(),
            })?;
        let period = Period::parse(period_expression)?;

        let first = period.aligned_start(start);
        let last = period.aligned_start(end);
        if first > last {
            return Ok(Vec::new());
        }

        // One range read covering the whole grid; `between` is exclusive
        // of its floored end bound, so push it one period past `end`.
        let query = ProjectionQuery::new().by_name(name).by_period(period);
        let query = match key {
            Some(key) => query.by_key(key),
            None => query.unkeyed(),
        };
        let filter = query.between(start, end + period.duration())?.into_filter();
        let stored: HashMap<DateTime<Utc>, Bucket> = self
            .store
            .query(&filter)
            .await?
            .into_iter()
            .map(|bucket| (bucket.start_date, bucket))
            .collect();

        let mut segments = Vec::new();
        let mut slot = first;
        while slot <= last {
            segments.push(match stored.get(&slot) {
                Some(bucket) => bucket.to_segment(),
                None => Segment::placeholder(
                    name,
                    period,
                    key.map(String::from),
                    slot,
                    definition.seed().clone(),
                ),
            });
            slot += period.duration();
        }

        tracing::debug!(
            name,
            period = %period,
            slots = segments.len(),
            stored = stored.len(),
            "Materialized time series"
        );
        Ok(segments)
    }
}
