//! Core matching pipeline for reconciling two polygon inventories.
//!
//! A source inventory (asset management) is matched against a target
//! inventory (the authoritative topography). The pipeline runs leaf-first:
//!
//! 1. [`compute_overlaps`] intersects every candidate pair and derives the
//!    overlap ratios on both sides.
//! 2. [`filter_overlap_min_ratio`] and [`annotate_match_flags`] discard
//!    insignificant pairs and resolve competing candidates.
//! 3. [`add_intersection_counts`] records the cardinality of each pair.
//! 4. [`Classifier`] runs the waterfall and assigns every source feature to
//!    exactly one [`Bucket`].
//! 5. [`ActionProcessor`] turns automatic buckets into
//!    [`ReconciliationAction`]s.
//!
//! [`reconcile_batch`] wires the stages together for several asset types.
//!
//! # Examples
//!
//! ```
//! use geo::{Coord, Rect};
//! use landmatch_core::{
//!     reconcile_asset, AssetType, Crs, FeatureCollection, MatchConfig, SourceFeature,
//!     TargetFeature, UuidGenerator,
//! };
//!
//! let square = |x: f64, side: f64| {
//!     Rect::new(Coord { x, y: 0.0 }, Coord { x: x + side, y: side }).to_polygon()
//! };
//! let sources = FeatureCollection::new(Crs::epsg(28992), vec![SourceFeature::new("{A}", square(0.0, 10.0))]);
//! let targets = FeatureCollection::new(Crs::epsg(28992), vec![TargetFeature::new("T1", square(0.2, 10.0))]);
//!
//! let report = reconcile_asset(AssetType::Terrain, &sources, &targets, &MatchConfig::default(), &UuidGenerator)?;
//! assert_eq!(report.plan.accepted_pairs().len(), 1);
//! # Ok::<(), landmatch_core::ReconcileError>(())
//! ```

pub mod actions;
pub mod bucket;
pub mod cardinality;
pub mod classify;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod overlap;
pub mod profile;
pub mod reconcile;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use actions::{
    ActionProcessor, Addition, BucketActions, GeometryChange, Pairing, PlanAudit, ProcessingMode,
    ReconciliationAction, ReconciliationPlan, Removal, processing_mode,
};
pub use bucket::Bucket;
pub use cardinality::add_intersection_counts;
pub use classify::{Classification, Classifier, StageContext, StageOutcome};
pub use config::{
    ElevationNullPolicy, HedgeFilterConfig, InternalOverlapPolicy, MatchConfig, NearUnityBand,
};
pub use error::{ConfigError, IntegrityError, PreconditionError, ReconcileError, Side};
pub use ids::{IdGenerator, UuidGenerator, brace_uuid, is_brace_uuid};
pub use model::{
    ATTR_DETAILED_MAINTAINER, ATTR_DETAILED_TYPE, ATTR_MAINTAINER, ATTR_TYPE, AssetType, Crs,
    FeatureCollection, SourceFeature, SourceId, TargetFeature, TargetId, UnknownAssetType,
};
pub use overlap::{
    OverlapRecord, annotate_match_flags, compute_overlaps, equals_exact, filter_overlap_min_ratio,
    resolve_match_conflicts,
};
pub use profile::{AssetProfile, Rule, RuleDirective};
pub use reconcile::{AssetReport, BatchInput, BatchReport, reconcile_asset, reconcile_batch};
pub use validate::{AssetFeatureRef, InternalOverlap, find_internal_overlaps};
