//! Projection engine and persistence backends for Rollup.
//!
//! # Overview
//!
//! This crate provides the moving parts around the `rollup-core` types:
//! - **[`ProjectionEngine`]**: folds incoming events into aggregated
//!   buckets via conditional upsert-or-merge
//! - **[`TimeSeries`]**: materializes dense, gap-filled time series over
//!   an arbitrary window
//! - **[`PostgresBucketStore`]**: persistent bucket store with JSONB
//!   content and a version-conditional upsert
//!
//! # Wiring
//!
//! ```ignore
//! use rollup_projections::{PostgresBucketStore, ProjectionEngine, TimeSeries};
//!
//! let store = Arc::new(
//!     PostgresBucketStore::new_with_database_url("postgres://localhost/projections").await?,
//! );
//! store.migrate().await?;
//!
//! let registry = Arc::new(
//!     DefinitionRegistry::builder()
//!         .register(page_views_definition)
//!         .build()?,
//! );
//!
//! // Write side: call from wherever events are detected.
//! let engine = ProjectionEngine::new(registry.clone(), store.clone());
//! engine.apply(&event).await?;
//!
//! // Read side.
//! let series = TimeSeries::new(registry, store);
//! let segments = series.materialize("page-views", "5 minutes", start, end).await?;
//! ```

pub mod engine;
pub mod postgres;
pub mod series;

// Re-export main types for convenience
pub use engine::ProjectionEngine;
pub use postgres::PostgresBucketStore;
pub use series::TimeSeries;
