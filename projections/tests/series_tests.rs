//! Behavioral tests for time-series materialization.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use rollup_core::definition::DefinitionRegistry;
use rollup_core::{Period, ProjectionDefinition, ProjectionError};
use rollup_projections::{ProjectionEngine, TimeSeries};
use rollup_testing::InMemoryBucketStore;
use rollup_testing::fixtures::{count_of, counting_definition, event_at, instant};
use serde_json::json;
use std::sync::Arc;

fn five_minutes() -> Period {
    Period::parse("5 minutes").unwrap()
}

fn setup(
    definitions: impl IntoIterator<Item = ProjectionDefinition>,
) -> (ProjectionEngine, TimeSeries) {
    let store = Arc::new(InMemoryBucketStore::new());
    let registry = Arc::new(
        definitions
            .into_iter()
            .fold(DefinitionRegistry::builder(), |builder, definition| {
                builder.register(definition)
            })
            .build()
            .unwrap(),
    );
    (
        ProjectionEngine::new(registry.clone(), store.clone()),
        TimeSeries::new(registry, store),
    )
}

#[tokio::test]
async fn fills_gaps_with_seed_placeholders() {
    let (engine, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    // One stored bucket at minute 0 of a 15-minute window.
    engine
        .apply(&event_at("page_view", "2026-03-01T10:01:00Z"))
        .await
        .unwrap();

    let segments = series
        .materialize(
            "page-views",
            "5 minutes",
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:14:59Z"),
        )
        .await
        .unwrap();

    assert_eq!(segments.len(), 3);
    let starts: Vec<_> = segments.iter().map(|s| s.start_date).collect();
    assert_eq!(
        starts,
        vec![
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:05:00Z"),
            instant("2026-03-01T10:10:00Z"),
        ]
    );

    assert!(!segments[0].is_placeholder());
    assert_eq!(count_of(&segments[0].content), 1);

    for placeholder in &segments[1..] {
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.content, json!({ "count": 0 }));
    }

    // end_date == start_date + duration - 1s, placeholders included.
    for segment in &segments {
        assert_eq!(segment.end_date, segment.period.end(segment.start_date));
    }
}

#[tokio::test]
async fn window_length_is_independent_of_data() {
    let (_, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    let segments = series
        .materialize(
            "page-views",
            "5 minutes",
            instant("2026-03-01T00:00:00Z"),
            instant("2026-03-01T01:00:00Z"),
        )
        .await
        .unwrap();

    // 00:00 through 01:00 inclusive on a 5-minute grid.
    assert_eq!(segments.len(), 13);
    assert!(segments.iter().all(rollup_core::Segment::is_placeholder));
}

#[tokio::test]
async fn mid_bucket_bounds_snap_to_the_grid() {
    let (engine, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    engine
        .apply(&event_at("page_view", "2026-03-01T10:06:00Z"))
        .await
        .unwrap();

    let segments = series
        .materialize(
            "page-views",
            "5 minutes",
            instant("2026-03-01T10:03:21Z"),
            instant("2026-03-01T10:08:59Z"),
        )
        .await
        .unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].start_date, instant("2026-03-01T10:00:00Z"));
    assert!(segments[0].is_placeholder());
    assert_eq!(segments[1].start_date, instant("2026-03-01T10:05:00Z"));
    assert!(!segments[1].is_placeholder());
}

#[tokio::test]
async fn materializes_one_key_of_a_partitioned_stream() {
    let definition = ProjectionDefinition::builder("page-views", "page_view")
        .period(five_minutes())
        .key_extractor(|event| event.payload["path"].as_str().map(String::from))
        .seed(json!({ "count": 0 }))
        .merge(|content, _| Ok(json!({ "count": content["count"].as_i64().unwrap_or(0) + 1 })))
        .build()
        .unwrap();
    let (engine, series) = setup([definition]);

    for (path, at) in [
        ("/pricing", "2026-03-01T10:01:00Z"),
        ("/docs", "2026-03-01T10:02:00Z"),
        ("/pricing", "2026-03-01T10:11:00Z"),
    ] {
        engine
            .apply(&event_at("page_view", at).with_payload(json!({ "path": path })))
            .await
            .unwrap();
    }

    let segments = series
        .materialize_for_key(
            "page-views",
            "5 minutes",
            "/pricing",
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:10:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(segments.len(), 3);
    assert_eq!(count_of(&segments[0].content), 1);
    assert!(segments[1].is_placeholder());
    assert_eq!(count_of(&segments[2].content), 1);
    // The /docs bucket never leaks into the /pricing series.
    assert!(segments.iter().all(|s| s.key.as_deref() == Some("/pricing")));
}

#[tokio::test]
async fn unknown_definition_is_an_error() {
    let (_, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    let result = series
        .materialize(
            "no-such-projection",
            "5 minutes",
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:10:00Z"),
        )
        .await;
    assert!(matches!(
        result,
        Err(ProjectionError::UnknownDefinition { name }) if name == "no-such-projection"
    ));
}

#[tokio::test]
async fn invalid_period_expression_is_an_error() {
    let (_, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    let result = series
        .materialize(
            "page-views",
            "whenever",
            instant("2026-03-01T10:00:00Z"),
            instant("2026-03-01T10:10:00Z"),
        )
        .await;
    assert!(matches!(
        result,
        Err(ProjectionError::InvalidPeriodExpression { .. })
    ));
}

#[tokio::test]
async fn inverted_window_yields_an_empty_series() {
    let (_, series) = setup([counting_definition(
        "page-views",
        "page_view",
        [five_minutes()],
    )]);

    let segments = series
        .materialize(
            "page-views",
            "5 minutes",
            instant("2026-03-01T11:00:00Z"),
            instant("2026-03-01T10:00:00Z"),
        )
        .await
        .unwrap();
    assert!(segments.is_empty());
}
