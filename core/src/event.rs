//! The engine's input: timestamped domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A timestamped domain event as handed to the projection engine.
///
/// The engine is agnostic to where events come from; whatever detects a
/// new event (an ingestion endpoint, an outbox poller, a message consumer)
/// builds one of these and calls `ProjectionEngine::apply`. The `source`
/// string drives definition applicability, `recorded_at` drives bucket
/// alignment, and the payload is opaque to everything except the
/// definitions' key-extraction and merge functions.
///
/// # Example
///
/// ```
/// use rollup_core::RecordedEvent;
/// use serde_json::json;
///
/// let event = RecordedEvent::new("page_view", "2026-03-01T10:07:42Z".parse()?)
///     .with_source_id("site-1")
///     .with_payload(json!({ "path": "/pricing" }));
/// assert_eq!(event.source, "page_view");
/// # Ok::<(), chrono::ParseError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Event source type; definitions declare which source they apply to.
    pub source: String,
    /// Identifier of the entity that owns the event, carried onto the
    /// bucket for join-style access. Not interpreted by the engine.
    pub source_id: Option<String>,
    /// When the event occurred. Determines which bucket it lands in.
    pub recorded_at: DateTime<Utc>,
    /// Opaque event payload, visible to key extractors and merge functions.
    pub payload: Value,
}

impl RecordedEvent {
    /// Create an event with an empty payload and no owning entity.
    #[must_use]
    pub fn new(source: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            source_id: None,
            recorded_at,
            payload: Value::Null,
        }
    }

    /// Attach the identifier of the owning entity.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Attach the event payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
