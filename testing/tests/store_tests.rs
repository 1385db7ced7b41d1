//! Tests for the in-memory bucket store.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use rollup_core::store::{BucketFilter, BucketStore, BucketWrite, KeyFilter};
use rollup_core::{BucketKey, Period, ProjectionError};
use rollup_testing::InMemoryBucketStore;
use rollup_testing::fixtures::instant;
use serde_json::json;

fn five_minutes() -> Period {
    Period::parse("5 minutes").unwrap()
}

fn key_at(key: Option<&str>, start: &str) -> BucketKey {
    BucketKey::new("page-views", five_minutes(), key.map(String::from), instant(start))
}

fn create(key: &BucketKey, content: serde_json::Value) -> BucketWrite {
    BucketWrite {
        key: key.clone(),
        content,
        source_id: Some("site-1".to_string()),
        expected_version: None,
    }
}

#[tokio::test]
async fn upsert_creates_then_finds() {
    let store = InMemoryBucketStore::new();
    let key = key_at(None, "2026-03-01T10:05:00Z");

    assert!(store.find(&key).await.unwrap().is_none());

    let created = store.upsert(create(&key, json!({ "count": 1 }))).await.unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.source_id.as_deref(), Some("site-1"));

    let found = store.find(&key).await.unwrap().unwrap();
    assert_eq!(found.content, json!({ "count": 1 }));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn create_conflicts_when_bucket_exists() {
    let store = InMemoryBucketStore::new();
    let key = key_at(None, "2026-03-01T10:05:00Z");

    store.upsert(create(&key, json!({ "count": 1 }))).await.unwrap();
    let result = store.upsert(create(&key, json!({ "count": 9 }))).await;
    assert!(matches!(result, Err(ProjectionError::Conflict { .. })));

    // The original content survives the losing write.
    let found = store.find(&key).await.unwrap().unwrap();
    assert_eq!(found.content, json!({ "count": 1 }));
}

#[tokio::test]
async fn replace_requires_the_current_version() {
    let store = InMemoryBucketStore::new();
    let key = key_at(None, "2026-03-01T10:05:00Z");
    store.upsert(create(&key, json!({ "count": 1 }))).await.unwrap();

    let stale = store
        .upsert(BucketWrite {
            key: key.clone(),
            content: json!({ "count": 2 }),
            source_id: None,
            expected_version: Some(7),
        })
        .await;
    assert!(matches!(stale, Err(ProjectionError::Conflict { .. })));

    let replaced = store
        .upsert(BucketWrite {
            key: key.clone(),
            content: json!({ "count": 2 }),
            source_id: None,
            expected_version: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(replaced.version, 2);
    assert_eq!(replaced.content, json!({ "count": 2 }));
    // source_id from creation is kept.
    assert_eq!(replaced.source_id.as_deref(), Some("site-1"));
}

#[tokio::test]
async fn replace_conflicts_when_bucket_is_missing() {
    let store = InMemoryBucketStore::new();
    let result = store
        .upsert(BucketWrite {
            key: key_at(None, "2026-03-01T10:05:00Z"),
            content: json!({}),
            source_id: None,
            expected_version: Some(1),
        })
        .await;
    assert!(matches!(result, Err(ProjectionError::Conflict { .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn query_orders_by_start_date_ascending() {
    let store = InMemoryBucketStore::new();
    for start in [
        "2026-03-01T10:10:00Z",
        "2026-03-01T10:00:00Z",
        "2026-03-01T10:05:00Z",
    ] {
        store
            .upsert(create(&key_at(None, start), json!({ "count": 1 })))
            .await
            .unwrap();
    }

    let buckets = store.query(&BucketFilter::default()).await.unwrap();
    let starts: Vec<_> = buckets.iter().map(|b| b.start_date).collect();
    assert_eq!(
        starts,
        vec![
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:05:00Z"),
            instant("2026-03-01T10:10:00Z"),
        ]
    );
}

#[tokio::test]
async fn query_applies_key_membership() {
    let store = InMemoryBucketStore::new();
    for key in ["/pricing", "/docs", "/blog"] {
        store
            .upsert(create(&key_at(Some(key), "2026-03-01T10:05:00Z"), json!({ "count": 1 })))
            .await
            .unwrap();
    }

    let filter = BucketFilter {
        keys: KeyFilter::In(vec!["/pricing".to_string(), "/docs".to_string()]),
        ..BucketFilter::default()
    };
    let buckets = store.query(&filter).await.unwrap();
    assert_eq!(buckets.len(), 2);
    assert!(buckets.iter().all(|b| b.key.as_deref() != Some("/blog")));
}

#[tokio::test]
async fn clear_empties_the_store() {
    let store = InMemoryBucketStore::new();
    store
        .upsert(create(&key_at(None, "2026-03-01T10:05:00Z"), json!({ "count": 1 })))
        .await
        .unwrap();
    assert_eq!(store.len(), 1);

    store.clear();
    assert!(store.is_empty());
    assert!(store.bucket_keys().is_empty());
}
