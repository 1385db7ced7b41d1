//! Testing utilities for the Rollup projection engine.
//!
//! # Overview
//!
//! Provides fast, deterministic in-memory infrastructure for testing
//! projection behavior without a database:
//! - [`InMemoryBucketStore`]: `HashMap`-backed bucket store whose
//!   conditional upsert is linearizable under its write lock
//! - [`fixtures`]: event and definition builders shared across tests
//!
//! # Example
//!
//! ```ignore
//! use rollup_testing::{fixtures, InMemoryBucketStore};
//!
//! let store = Arc::new(InMemoryBucketStore::new());
//! let registry = Arc::new(
//!     DefinitionRegistry::builder()
//!         .register(fixtures::counting_definition(
//!             "page-views",
//!             "page_view",
//!             [Period::parse("5 minutes")?],
//!         ))
//!         .build()?,
//! );
//! let engine = ProjectionEngine::new(registry, store.clone());
//! engine.apply(&fixtures::event_at("page_view", "2026-03-01T10:07:42Z")).await?;
//! assert_eq!(store.len(), 1);
//! ```

pub mod fixtures;
pub mod store_mocks;

pub use store_mocks::InMemoryBucketStore;
