//! # Rollup Core
//!
//! Core types and traits for the Rollup time-bucketed projection engine.
//!
//! Rollup aggregates a stream of timestamped domain events into
//! fixed-width time buckets, keeping a running, mergeable summary per
//! bucket instead of storing every raw event. This crate holds the pure
//! building blocks; orchestration and persistence backends live in
//! `rollup-projections`.
//!
//! ## Core Concepts
//!
//! - **[`Period`]**: a fixed bucket width with alignment arithmetic
//!   (floor an instant to its bucket start, derive the inclusive end)
//! - **[`RecordedEvent`]**: a timestamped domain event, the engine's input
//! - **[`ProjectionDefinition`]**: a named aggregation: periods, optional
//!   key extractor, seed content, and a merge function
//! - **[`DefinitionRegistry`]**: process-wide, immutable definition lookup
//! - **[`Bucket`]** / **[`Segment`]**: the aggregated record and its
//!   time-series projection
//! - **[`BucketStore`]**: the persistence boundary, with a versioned
//!   conditional upsert for linearizable per-bucket merges
//! - **[`ProjectionQuery`]**: conjunctive range filters with boundary
//!   rounding
//!
//! ## Data Flow
//!
//! ```text
//! event ──► engine resolves definitions for event.source
//!       ──► Period::aligned_start(event.recorded_at) per (def, period)
//!       ──► conditional upsert-or-merge into the BucketStore
//!       ──► later: ProjectionQuery range reads, TimeSeries gap filling
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod bucket;
pub mod definition;
pub mod error;
pub mod event;
pub mod period;
pub mod query;
pub mod store;

pub use bucket::{Bucket, BucketKey, Segment};
pub use definition::{
    DefinitionBuilder, DefinitionRegistry, KeyExtractor, MergeError, MergeFn,
    ProjectionDefinition, RegistryBuilder,
};
pub use error::{ProjectionError, Result};
pub use event::RecordedEvent;
pub use period::Period;
pub use query::ProjectionQuery;
pub use store::{BucketFilter, BucketStore, BucketWrite, KeyFilter};
