//! Facade crate for the landmatch polygon reconciliation engine.
//!
//! This crate re-exports the core matching pipeline so applications depend on
//! one crate name.

#![forbid(unsafe_code)]

pub use landmatch_core::{
    ActionProcessor, AssetProfile, AssetReport, AssetType, BatchInput, BatchReport, Bucket,
    Classification, Classifier, ConfigError, Crs, FeatureCollection, IdGenerator, IntegrityError,
    InternalOverlap, MatchConfig, OverlapRecord, PreconditionError, ReconcileError,
    ReconciliationAction, ReconciliationPlan, SourceFeature, SourceId, TargetFeature, TargetId,
    UuidGenerator, compute_overlaps, reconcile_asset, reconcile_batch,
};

#[cfg(feature = "test-support")]
pub use landmatch_core::test_support;
