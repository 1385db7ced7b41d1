//! Fixture builders shared by projection tests.

#![allow(clippy::unwrap_used)] // Test fixtures unwrap on inputs the test controls
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Utc};
use rollup_core::{Period, ProjectionDefinition, RecordedEvent};
use serde_json::{Value, json};

/// Parse an RFC 3339 instant; panics on malformed test input.
#[must_use]
pub fn instant(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// An event of `source` recorded at `at`, with no payload.
#[must_use]
pub fn event_at(source: &str, at: &str) -> RecordedEvent {
    RecordedEvent::new(source, instant(at))
}

/// A definition that counts events per bucket: seed `{"count": 0}`,
/// merge increments. The workhorse fixture; counting makes merge
/// multiplicity observable, so most engine tests use it.
#[must_use]
pub fn counting_definition(
    name: &str,
    source: &str,
    periods: impl IntoIterator<Item = Period>,
) -> ProjectionDefinition {
    ProjectionDefinition::builder(name, source)
        .periods(periods)
        .seed(json!({ "count": 0 }))
        .merge(|content, _event| {
            let count = content["count"].as_i64().unwrap_or(0);
            Ok(json!({ "count": count + 1 }))
        })
        .build()
        .unwrap()
}

/// The counter value inside content produced by [`counting_definition`].
#[must_use]
pub fn count_of(content: &Value) -> i64 {
    content["count"].as_i64().unwrap_or(0)
}
