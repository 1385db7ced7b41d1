//! Composable range-query builder over the bucket relation.
//!
//! `ProjectionQuery` assembles the conjunctive predicates of a
//! `BucketFilter` and owns the two pieces of behavior a raw filter does
//! not have: the precondition checks on [`ProjectionQuery::between`]
//! (name first, then period) and the rounding of both range bounds down
//! to bucket boundaries.
//!
//! # Example
//!
//! ```
//! use rollup_core::{Period, ProjectionQuery};
//!
//! let filter = ProjectionQuery::new()
//!     .by_name("page-views")
//!     .by_period(Period::parse("5 minutes")?)
//!     .by_key("/pricing")
//!     .between("2026-03-01T10:04:00Z".parse()?, "2026-03-01T10:09:00Z".parse()?)?
//!     .into_filter();
//! // Mid-bucket bounds are floored: the range covers exactly the
//! // 10:00 bucket.
//! assert_eq!(
//!     filter.range,
//!     Some(("2026-03-01T10:00:00Z".parse()?, "2026-03-01T10:05:00Z".parse()?))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{ProjectionError, Result};
use crate::period::Period;
use crate::store::{BucketFilter, KeyFilter};
use chrono::{DateTime, Utc};

/// Builder of conjunctive bucket filters with boundary rounding.
///
/// All filters compose conjunctively. Results carry no ordering guarantee
/// beyond the store contract (`start_date` ascending).
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct ProjectionQuery {
    filter: BucketFilter,
}

impl ProjectionQuery {
    /// Start an unconstrained query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on the projection name. Required before
    /// [`ProjectionQuery::between`].
    pub fn by_name(mut self, name: impl Into<String>) -> Self {
        self.filter.projection_name = Some(name.into());
        self
    }

    /// Exact match on the canonical period. Required before
    /// [`ProjectionQuery::between`].
    pub fn by_period(mut self, period: Period) -> Self {
        self.filter.period = Some(period);
        self
    }

    /// Only buckets with this partition key. Calling repeatedly (or
    /// mixing with [`ProjectionQuery::by_keys`]) widens the membership set.
    pub fn by_key(mut self, key: impl Into<String>) -> Self {
        self.push_keys(std::iter::once(key.into()));
        self
    }

    /// Only buckets whose partition key is in the given set.
    pub fn by_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.push_keys(keys.into_iter().map(Into::into));
        self
    }

    /// Only buckets of the unkeyed stream.
    pub fn unkeyed(mut self) -> Self {
        self.filter.keys = KeyFilter::Unkeyed;
        self
    }

    /// Constrain `start_date` to `[floor(start), floor(end))`.
    ///
    /// Both bounds are floored to the period's bucket boundary, so a
    /// mid-bucket bound selects that bucket's start. The end bound is
    /// exclusive: a bucket starting exactly at `floor(end)` is not
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::MissingProjectionName`] when no name
    /// filter was applied, then [`ProjectionError::MissingProjectionPeriod`]
    /// when a name is present but no period filter was applied.
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if self.filter.projection_name.is_none() {
            return Err(ProjectionError::MissingProjectionName);
        }
        let Some(period) = self.filter.period else {
            return Err(ProjectionError::MissingProjectionPeriod);
        };
        self.filter.range = Some((period.aligned_start(start), period.aligned_start(end)));
        Ok(self)
    }

    /// Finish building; the filter is handed to `BucketStore::query`.
    pub fn into_filter(self) -> BucketFilter {
        self.filter
    }

    fn push_keys(&mut self, keys: impl Iterator<Item = String>) {
        match &mut self.filter.keys {
            KeyFilter::In(existing) => existing.extend(keys),
            _ => self.filter.keys = KeyFilter::In(keys.collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn five_minutes() -> Period {
        Period::parse("5 minutes").unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn between_requires_name_before_period() {
        // No name, no period: the name check comes first.
        let result = ProjectionQuery::new()
            .between(at("2026-03-01T10:00:00Z"), at("2026-03-01T11:00:00Z"));
        assert!(matches!(result, Err(ProjectionError::MissingProjectionName)));

        // Period alone still reports the missing name first.
        let result = ProjectionQuery::new()
            .by_period(five_minutes())
            .between(at("2026-03-01T10:00:00Z"), at("2026-03-01T11:00:00Z"));
        assert!(matches!(result, Err(ProjectionError::MissingProjectionName)));

        // Name present, period missing.
        let result = ProjectionQuery::new()
            .by_name("page-views")
            .between(at("2026-03-01T10:00:00Z"), at("2026-03-01T11:00:00Z"));
        assert!(matches!(result, Err(ProjectionError::MissingProjectionPeriod)));
    }

    #[test]
    fn between_floors_both_bounds() {
        // between(T+4min, T+9min) with a 5-minute period is equivalent
        // to between(T, T+5min).
        let filter = ProjectionQuery::new()
            .by_name("page-views")
            .by_period(five_minutes())
            .between(at("2026-03-01T10:04:00Z"), at("2026-03-01T10:09:00Z"))
            .unwrap()
            .into_filter();
        assert_eq!(
            filter.range,
            Some((at("2026-03-01T10:00:00Z"), at("2026-03-01T10:05:00Z")))
        );
    }

    #[test]
    fn aligned_bounds_pass_through() {
        let filter = ProjectionQuery::new()
            .by_name("page-views")
            .by_period(five_minutes())
            .between(at("2026-03-01T10:00:00Z"), at("2026-03-01T10:15:00Z"))
            .unwrap()
            .into_filter();
        assert_eq!(
            filter.range,
            Some((at("2026-03-01T10:00:00Z"), at("2026-03-01T10:15:00Z")))
        );
    }

    #[test]
    fn key_filters_accumulate() {
        let filter = ProjectionQuery::new()
            .by_key("/pricing")
            .by_keys(["/docs", "/blog"])
            .into_filter();
        assert_eq!(
            filter.keys,
            KeyFilter::In(vec![
                "/pricing".to_string(),
                "/docs".to_string(),
                "/blog".to_string()
            ])
        );
    }
}
