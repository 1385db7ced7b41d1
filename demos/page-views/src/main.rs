//! Page Views Demo
//!
//! Wires the projection engine end-to-end against the in-memory store:
//! registers two definitions over the same `page_view` event source (a
//! per-path counter and an unkeyed site-wide counter), folds in a batch
//! of events, then reads back a range query and a gap-filled time series.
//!
//! # Running the Example
//!
//! ```bash
//! cargo run -p page-views
//! ```

#![allow(missing_docs)]
#![allow(clippy::expect_used)] // Examples can use expect

use rollup_core::definition::DefinitionRegistry;
use rollup_core::store::BucketStore;
use rollup_core::{Period, ProjectionDefinition, ProjectionQuery, RecordedEvent};
use rollup_projections::{ProjectionEngine, TimeSeries};
use rollup_testing::InMemoryBucketStore;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn count_up(content: &serde_json::Value) -> serde_json::Value {
    json!({ "count": content["count"].as_i64().unwrap_or(0) + 1 })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rollup_projections=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Definitions: static configuration, frozen at startup.
    let five_minutes = Period::parse("5 minutes")?;
    let registry = Arc::new(
        DefinitionRegistry::builder()
            .register(
                ProjectionDefinition::builder("page-views", "page_view")
                    .periods([five_minutes, Period::parse("1 hour")?])
                    .key_extractor(|event| event.payload["path"].as_str().map(String::from))
                    .seed(json!({ "count": 0 }))
                    .merge(|content, _event| Ok(count_up(content)))
                    .build()?,
            )
            .register(
                ProjectionDefinition::builder("site-views", "page_view")
                    .period(five_minutes)
                    .seed(json!({ "count": 0 }))
                    .merge(|content, _event| Ok(count_up(content)))
                    .build()?,
            )
            .build()?,
    );

    let store = Arc::new(InMemoryBucketStore::new());
    let engine = ProjectionEngine::new(registry.clone(), store.clone());

    // 3. Fold in a morning of traffic.
    let visits = [
        ("/pricing", "2026-03-01T10:01:10Z"),
        ("/pricing", "2026-03-01T10:03:55Z"),
        ("/docs", "2026-03-01T10:04:02Z"),
        ("/pricing", "2026-03-01T10:11:30Z"),
        ("/docs", "2026-03-01T10:27:44Z"),
    ];
    for (path, at) in visits {
        let event = RecordedEvent::new("page_view", at.parse()?)
            .with_source_id("site-1")
            .with_payload(json!({ "path": path }));
        engine.apply(&event).await?;
    }
    tracing::info!(events = visits.len(), "Applied events");

    // 4. Range query: /pricing buckets in the first quarter hour.
    let filter = ProjectionQuery::new()
        .by_name("page-views")
        .by_period(five_minutes)
        .by_key("/pricing")
        .between("2026-03-01T10:00:00Z".parse()?, "2026-03-01T10:15:00Z".parse()?)?
        .into_filter();
    println!("/pricing buckets between 10:00 and 10:15:");
    for bucket in store.query(&filter).await? {
        println!(
            "  {} .. {}  {}",
            bucket.start_date, bucket.end_date(), bucket.content
        );
    }

    // 5. Dense series: one segment per 5-minute slot, gaps filled with
    // the seed.
    let series = TimeSeries::new(registry, store);
    let segments = series
        .materialize(
            "site-views",
            "5 minutes",
            "2026-03-01T10:00:00Z".parse()?,
            "2026-03-01T10:29:59Z".parse()?,
        )
        .await?;
    println!("site-views series, 10:00 through 10:30:");
    for segment in segments {
        let marker = if segment.is_placeholder() { " (empty)" } else { "" };
        println!("  {}  {}{marker}", segment.start_date, segment.content);
    }

    Ok(())
}
