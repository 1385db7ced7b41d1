//! Projection definitions and the process-wide registry.
//!
//! A [`ProjectionDefinition`] is the static description of one named
//! aggregation: which event source it applies to, which periods it
//! maintains, how to derive a partition key from an event, the seed value a
//! bucket starts from, and the merge function that folds an event into a
//! bucket's content. Definitions are built once at startup, collected into
//! a [`DefinitionRegistry`], and immutable thereafter.
//!
//! # Example
//!
//! ```
//! use rollup_core::{Period, ProjectionDefinition};
//! use serde_json::json;
//!
//! let definition = ProjectionDefinition::builder("page-views", "page_view")
//!     .period(Period::parse("5 minutes")?)
//!     .key_extractor(|event| event.payload["path"].as_str().map(String::from))
//!     .seed(json!({ "count": 0 }))
//!     .merge(|content, _event| {
//!         let count = content["count"].as_i64().unwrap_or(0);
//!         Ok(json!({ "count": count + 1 }))
//!     })
//!     .build()?;
//! assert_eq!(definition.name(), "page-views");
//! # Ok::<(), rollup_core::ProjectionError>(())
//! ```

use crate::error::{ProjectionError, Result};
use crate::event::RecordedEvent;
use crate::period::Period;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error returned by a definition's merge function.
///
/// Carries only a message; the engine wraps it into
/// [`ProjectionError::MergeFailed`] together with the definition name and
/// period of the bucket that was being updated.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct MergeError(String);

impl MergeError {
    /// Create a merge error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Extracts an optional partition key from an event.
pub type KeyExtractor = Arc<dyn Fn(&RecordedEvent) -> Option<String> + Send + Sync>;

/// Folds an event into a bucket's current content.
///
/// Must be pure: same content and event always produce the same result,
/// with no side effects. The engine may invoke it more than once for the
/// same event when a conditional write loses a race.
pub type MergeFn =
    Arc<dyn Fn(&Value, &RecordedEvent) -> std::result::Result<Value, MergeError> + Send + Sync>;

/// Static description of one named aggregation.
///
/// Created through [`ProjectionDefinition::builder`]. See the module docs
/// for an end-to-end example.
#[derive(Clone)]
pub struct ProjectionDefinition {
    name: String,
    source: String,
    periods: Vec<Period>,
    key_extractor: Option<KeyExtractor>,
    seed: Value,
    merge: MergeFn,
}

impl ProjectionDefinition {
    /// Start building a definition named `name`, applicable to events
    /// whose `source` matches.
    #[must_use]
    pub fn builder(name: impl Into<String>, source: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder {
            name: name.into(),
            source: source.into(),
            periods: Vec::new(),
            key_extractor: None,
            seed: Value::Null,
            merge: None,
        }
    }

    /// Stable definition name; identifies buckets in the store.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event source this definition applies to.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The periods this definition maintains a bucket stream for.
    #[must_use]
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Content a bucket starts from, and the placeholder content for
    /// gap-filled time-series segments.
    #[must_use]
    pub const fn seed(&self) -> &Value {
        &self.seed
    }

    /// Partition key for `event`, if this definition partitions by key.
    #[must_use]
    pub fn key_for(&self, event: &RecordedEvent) -> Option<String> {
        self.key_extractor.as_ref().and_then(|extract| extract(event))
    }

    /// Fold `event` into `content`.
    ///
    /// # Errors
    ///
    /// Propagates the merge function's [`MergeError`].
    pub fn merge(
        &self,
        content: &Value,
        event: &RecordedEvent,
    ) -> std::result::Result<Value, MergeError> {
        (self.merge)(content, event)
    }
}

// Manual Debug since the extractor and merge functions are opaque.
impl fmt::Debug for ProjectionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionDefinition")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("periods", &self.periods)
            .field("keyed", &self.key_extractor.is_some())
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`ProjectionDefinition`].
#[must_use]
pub struct DefinitionBuilder {
    name: String,
    source: String,
    periods: Vec<Period>,
    key_extractor: Option<KeyExtractor>,
    seed: Value,
    merge: Option<MergeFn>,
}

impl DefinitionBuilder {
    /// Add one period. Duplicate periods are ignored.
    pub fn period(mut self, period: Period) -> Self {
        if !self.periods.contains(&period) {
            self.periods.push(period);
        }
        self
    }

    /// Add several periods. Duplicates are ignored.
    pub fn periods(self, periods: impl IntoIterator<Item = Period>) -> Self {
        periods.into_iter().fold(self, Self::period)
    }

    /// Partition buckets by the key this function extracts. Events for
    /// which it returns `None` land in the unkeyed bucket stream.
    pub fn key_extractor(
        mut self,
        extract: impl Fn(&RecordedEvent) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.key_extractor = Some(Arc::new(extract));
        self
    }

    /// Content a new bucket starts from. Defaults to JSON `null`.
    pub fn seed(mut self, seed: Value) -> Self {
        self.seed = seed;
        self
    }

    /// The combine step: `(current content, event) -> new content`.
    ///
    /// When omitted, the bucket content is replaced with the event's
    /// payload on every merge (a "latest value" aggregation).
    pub fn merge(
        mut self,
        merge: impl Fn(&Value, &RecordedEvent) -> std::result::Result<Value, MergeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::EmptyPeriods`] when no period was added;
    /// a definition with no periods would never produce a bucket.
    pub fn build(self) -> Result<ProjectionDefinition> {
        if self.periods.is_empty() {
            return Err(ProjectionError::EmptyPeriods { name: self.name });
        }
        Ok(ProjectionDefinition {
            name: self.name,
            source: self.source,
            periods: self.periods,
            key_extractor: self.key_extractor,
            seed: self.seed,
            merge: self.merge.unwrap_or_else(|| {
                Arc::new(|_: &Value, event: &RecordedEvent| Ok(event.payload.clone()))
            }),
        })
    }
}

/// Process-wide lookup of registered definitions.
///
/// Built once at startup and treated as read-only afterwards; hand the
/// engine an `Arc<DefinitionRegistry>` and share it freely. Lookup by
/// event source preserves registration order.
///
/// # Example
///
/// ```ignore
/// let registry = Arc::new(
///     DefinitionRegistry::builder()
///         .register(page_views)
///         .register(unique_visitors)
///         .build()?,
/// );
/// let engine = ProjectionEngine::new(registry.clone(), store);
/// ```
#[derive(Debug)]
pub struct DefinitionRegistry {
    by_source: HashMap<String, Vec<Arc<ProjectionDefinition>>>,
    by_name: HashMap<String, Arc<ProjectionDefinition>>,
}

impl DefinitionRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            definitions: Vec::new(),
        }
    }

    /// Definitions applicable to events of `source`, in registration order.
    #[must_use]
    pub fn definitions_for(&self, source: &str) -> &[Arc<ProjectionDefinition>] {
        self.by_source.get(source).map_or(&[], Vec::as_slice)
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ProjectionDefinition>> {
        self.by_name.get(name)
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Builder for [`DefinitionRegistry`].
#[must_use]
pub struct RegistryBuilder {
    definitions: Vec<ProjectionDefinition>,
}

impl RegistryBuilder {
    /// Register a definition.
    pub fn register(mut self, definition: ProjectionDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::DuplicateDefinition`] when two
    /// definitions share a name.
    pub fn build(self) -> Result<DefinitionRegistry> {
        let mut by_source: HashMap<String, Vec<Arc<ProjectionDefinition>>> = HashMap::new();
        let mut by_name = HashMap::new();

        for definition in self.definitions {
            let definition = Arc::new(definition);
            if by_name
                .insert(definition.name().to_string(), definition.clone())
                .is_some()
            {
                return Err(ProjectionError::DuplicateDefinition {
                    name: definition.name().to_string(),
                });
            }
            by_source
                .entry(definition.source().to_string())
                .or_default()
                .push(definition);
        }

        Ok(DefinitionRegistry { by_source, by_name })
    }
}
