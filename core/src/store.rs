//! The persistence boundary: the bucket store trait and its query filter.
//!
//! The engine treats persistence as an external collaborator behind
//! [`BucketStore`]. Implementations must make [`BucketStore::upsert`]
//! atomic per bucket tuple: the versioned conditional write is what turns
//! the engine's read-modify-write into a linearizable merge (see the
//! engine's conflict-retry loop). The trait returns boxed futures so the
//! engine can hold an `Arc<dyn BucketStore>`.

use crate::bucket::{Bucket, BucketKey};
use crate::error::Result;
use crate::period::Period;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Partition-key predicate of a [`BucketFilter`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyFilter {
    /// No key constraint.
    #[default]
    Any,
    /// Only buckets of the unkeyed stream (`key` absent).
    Unkeyed,
    /// Only buckets whose key is in the set.
    In(Vec<String>),
}

/// Conjunctive predicates over the bucket relation.
///
/// Built by `ProjectionQuery` (which enforces the `between` preconditions
/// and boundary rounding) and interpreted by each store backend. The
/// `range` bounds are already rounded to bucket boundaries; the end bound
/// is exclusive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketFilter {
    /// Exact match on `projection_name`.
    pub projection_name: Option<String>,
    /// Exact match on the canonical period.
    pub period: Option<Period>,
    /// Partition-key predicate.
    pub keys: KeyFilter,
    /// Half-open aligned range: `start <= bucket.start_date < end`.
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BucketFilter {
    /// Evaluate this filter against a bucket.
    ///
    /// In-memory backends apply this directly; SQL backends translate
    /// each predicate instead but must match these semantics.
    #[must_use]
    pub fn matches(&self, bucket: &Bucket) -> bool {
        if let Some(name) = &self.projection_name {
            if bucket.projection_name != *name {
                return false;
            }
        }
        if let Some(period) = &self.period {
            if bucket.period != *period {
                return false;
            }
        }
        match &self.keys {
            KeyFilter::Any => {}
            KeyFilter::Unkeyed => {
                if bucket.key.is_some() {
                    return false;
                }
            }
            KeyFilter::In(keys) => {
                let Some(key) = &bucket.key else { return false };
                if !keys.contains(key) {
                    return false;
                }
            }
        }
        if let Some((start, end)) = &self.range {
            if bucket.start_date < *start || bucket.start_date >= *end {
                return false;
            }
        }
        true
    }
}

/// A conditional bucket write.
///
/// `expected_version: None` creates the bucket and fails with
/// `ProjectionError::Conflict` if it already exists; `Some(v)` replaces
/// the content of the bucket currently at version `v` and fails with
/// `Conflict` when the version moved (or the bucket vanished). The engine
/// resolves conflicts by re-reading and retrying the merge.
#[derive(Clone, Debug)]
pub struct BucketWrite {
    /// Identity tuple of the bucket to write.
    pub key: BucketKey,
    /// The merged content to store.
    pub content: Value,
    /// Owning entity of the event being folded in; stores keep the value
    /// from bucket creation and ignore it on replacement.
    pub source_id: Option<String>,
    /// Conditional-write token; see the struct docs.
    pub expected_version: Option<u64>,
}

/// Storage backend for aggregated buckets.
///
/// The store is the only shared mutable resource in the system. The
/// contract mirrors the three operations the core needs: point lookup,
/// conditional upsert, and conjunctive range query.
///
/// # Dyn compatibility
///
/// Methods return `Pin<Box<dyn Future>>` instead of `impl Future` so the
/// engine and materializer can hold `Arc<dyn BucketStore>`.
pub trait BucketStore: Send + Sync {
    /// Point lookup by identity tuple.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` when the backend fails.
    fn find(
        &self,
        key: &BucketKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bucket>>> + Send + '_>>;

    /// Conditional create-or-replace; see [`BucketWrite`].
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Conflict` when the expected version does
    /// not hold, `ProjectionError::Storage` when the backend fails.
    fn upsert(
        &self,
        write: BucketWrite,
    ) -> Pin<Box<dyn Future<Output = Result<Bucket>> + Send + '_>>;

    /// All buckets matching `filter`, ordered by `start_date` ascending.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Storage` when the backend fails.
    fn query(
        &self,
        filter: &BucketFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bucket>>> + Send + '_>>;
}
