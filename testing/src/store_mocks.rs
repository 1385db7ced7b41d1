//! In-memory bucket store for fast, deterministic testing.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use chrono::Utc;
use rollup_core::error::{ProjectionError, Result};
use rollup_core::store::{BucketFilter, BucketStore, BucketWrite};
use rollup_core::{Bucket, BucketKey};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// In-memory [`BucketStore`] backed by a `HashMap` behind an `RwLock`.
///
/// The conditional upsert runs entirely under the write lock, so merges on
/// one bucket tuple are trivially linearizable, matching the guarantee a
/// SQL backend provides with its versioned conditional write. Clones share
/// the same underlying map, which lets a test keep a handle for
/// assertions while the engine holds another.
///
/// # Example
///
/// ```
/// use rollup_testing::InMemoryBucketStore;
///
/// let store = InMemoryBucketStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: Arc<RwLock<HashMap<BucketKey, Bucket>>>,
}

impl InMemoryBucketStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all buckets (for test isolation).
    pub fn clear(&self) {
        self.buckets.write().unwrap().clear();
    }

    /// Number of stored buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.read().unwrap().len()
    }

    /// Whether no buckets are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.read().unwrap().is_empty()
    }

    /// Identity tuples of every stored bucket, in no particular order.
    #[must_use]
    pub fn bucket_keys(&self) -> Vec<BucketKey> {
        self.buckets.read().unwrap().keys().cloned().collect()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn find(
        &self,
        key: &BucketKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bucket>>> + Send + '_>> {
        let key = key.clone();
        Box::pin(async move { Ok(self.buckets.read().unwrap().get(&key).cloned()) })
    }

    fn upsert(
        &self,
        write: BucketWrite,
    ) -> Pin<Box<dyn Future<Output = Result<Bucket>> + Send + '_>> {
        Box::pin(async move {
            let conflict = ProjectionError::Conflict {
                name: write.key.projection_name.clone(),
                period: write.key.period.to_string(),
                start_date: write.key.start_date,
            };

            let mut buckets = self.buckets.write().unwrap();
            match write.expected_version {
                None => {
                    if buckets.contains_key(&write.key) {
                        return Err(conflict);
                    }
                    let bucket = Bucket {
                        projection_name: write.key.projection_name.clone(),
                        period: write.key.period,
                        key: write.key.key.clone(),
                        start_date: write.key.start_date,
                        content: write.content,
                        source_id: write.source_id,
                        version: 1,
                        updated_at: Utc::now(),
                    };
                    buckets.insert(write.key, bucket.clone());
                    Ok(bucket)
                }
                Some(expected) => {
                    let Some(existing) = buckets.get_mut(&write.key) else {
                        return Err(conflict);
                    };
                    if existing.version != expected {
                        return Err(conflict);
                    }
                    existing.content = write.content;
                    existing.version += 1;
                    existing.updated_at = Utc::now();
                    Ok(existing.clone())
                }
            }
        })
    }

    fn query(
        &self,
        filter: &BucketFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bucket>>> + Send + '_>> {
        let filter = filter.clone();
        Box::pin(async move {
            let buckets = self.buckets.read().unwrap();
            let mut matching: Vec<Bucket> = buckets
                .values()
                .filter(|bucket| filter.matches(bucket))
                .cloned()
                .collect();
            matching.sort_by(|a, b| {
                a.start_date
                    .cmp(&b.start_date)
                    .then_with(|| a.key.cmp(&b.key))
            });
            Ok(matching)
        })
    }
}
