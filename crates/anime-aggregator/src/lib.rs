//! Multi-source anime metadata aggregation.
//!
//! Queries several catalog services in parallel, tolerates slow or failing
//! sources, fuses records describing the same title by fuzzy title matching
//! and serves the fused result through a TTL cache.

pub mod adapters;
pub mod aggregator;
pub mod cache;
pub mod error;
pub mod merger;

pub use adapters::{build_adapters, SourceAdapter};
pub use aggregator::{Aggregator, AggregatorOptions, BranchOutcome};
pub use cache::{spawn_sweeper, CacheStats, TtlCache};
pub use error::SourceError;
pub use merger::SimilarityMerger;
