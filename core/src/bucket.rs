//! Aggregated bucket records and time-series segments.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The natural primary key of a bucket: at most one bucket exists per
/// (`projection_name`, `period`, `key`, `start_date`) tuple, and this
/// tuple is the unit of merge atomicity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Name of the owning projection definition.
    pub projection_name: String,
    /// Bucket width.
    pub period: Period,
    /// Partition key; `None` means the unkeyed bucket stream.
    pub key: Option<String>,
    /// Aligned bucket start (inclusive).
    pub start_date: DateTime<Utc>,
}

impl BucketKey {
    /// Assemble a bucket key. `start_date` is expected to already be
    /// aligned via [`Period::aligned_start`].
    #[must_use]
    pub fn new(
        projection_name: impl Into<String>,
        period: Period,
        key: Option<String>,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            projection_name: projection_name.into(),
            period,
            key,
            start_date,
        }
    }
}

/// One aggregated bucket: the running, mergeable summary of every event
/// that landed in its time slot.
///
/// Created by the engine on the first event landing in the slot, mutated
/// on every subsequent one, never deleted by the engine. The `version`
/// field is the conditional-write token the store uses to serialize
/// concurrent merges on the same tuple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Name of the owning projection definition.
    pub projection_name: String,
    /// Bucket width; rendered in canonical form when persisted.
    pub period: Period,
    /// Partition key; `None` means the unkeyed bucket stream.
    pub key: Option<String>,
    /// Aligned bucket start (inclusive).
    pub start_date: DateTime<Utc>,
    /// Opaque aggregated payload produced by the definition's merge function.
    pub content: Value,
    /// Owning entity of the first event that landed here, for join-style
    /// access. Not interpreted by the engine.
    pub source_id: Option<String>,
    /// Monotonic per-bucket version, starting at 1 on creation.
    pub version: u64,
    /// When this bucket was last written.
    pub updated_at: DateTime<Utc>,
}

impl Bucket {
    /// Inclusive end of this bucket: `start_date + period − 1 second`.
    /// Derived, never stored.
    #[must_use]
    pub fn end_date(&self) -> DateTime<Utc> {
        self.period.end(self.start_date)
    }

    /// The identity tuple of this bucket.
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey {
            projection_name: self.projection_name.clone(),
            period: self.period,
            key: self.key.clone(),
            start_date: self.start_date,
        }
    }

    /// Project this bucket into a time-series [`Segment`].
    #[must_use]
    pub fn to_segment(&self) -> Segment {
        Segment {
            projection_name: self.projection_name.clone(),
            period: self.period,
            key: self.key.clone(),
            start_date: self.start_date,
            end_date: self.end_date(),
            content: self.content.clone(),
            placeholder: false,
        }
    }
}

/// One element of a dense, gap-filled time series.
///
/// Either the projection of a stored bucket (via [`Bucket::to_segment`])
/// or a placeholder the materializer synthesized for a bucket with no
/// data. Placeholders carry the definition's seed content and are never
/// persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Name of the owning projection definition.
    pub projection_name: String,
    /// Bucket width.
    pub period: Period,
    /// Partition key, when the series was materialized for one.
    pub key: Option<String>,
    /// Bucket start (inclusive).
    pub start_date: DateTime<Utc>,
    /// Bucket end (inclusive): `start_date + period − 1 second`.
    pub end_date: DateTime<Utc>,
    /// Aggregated content, or the definition's seed for placeholders.
    pub content: Value,
    placeholder: bool,
}

impl Segment {
    /// Build a placeholder segment for a bucket with no stored data.
    #[must_use]
    pub fn placeholder(
        projection_name: impl Into<String>,
        period: Period,
        key: Option<String>,
        start_date: DateTime<Utc>,
        seed: Value,
    ) -> Self {
        Self {
            projection_name: projection_name.into(),
            period,
            key,
            start_date,
            end_date: period.end(start_date),
            content: seed,
            placeholder: true,
        }
    }

    /// Whether this segment was synthesized for a gap rather than read
    /// from a stored bucket.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
