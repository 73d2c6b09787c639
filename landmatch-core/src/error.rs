//! Error taxonomy for the matching pipeline.
//!
//! Precondition failures and integrity violations abort processing for one
//! asset type only. Recoverable conditions are logged and never surface here.

use std::fmt;

use thiserror::Error;

use crate::{AssetType, Bucket, Crs, SourceId};

/// Which inventory an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Side {
    /// The asset-management inventory.
    Source,
    /// The authoritative inventory.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_pairs(pairs: &[(SourceId, SourceId)]) -> String {
    pairs
        .iter()
        .map(|(first, second)| format!("{first}/{second}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Input did not satisfy the pipeline's preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// A collection carried no coordinate reference system.
    #[error("{side} collection has no coordinate reference system")]
    MissingCrs {
        /// Collection lacking the reference system.
        side: Side,
    },
    /// Source and target collections use different reference systems.
    #[error("coordinate reference systems differ: source {source_crs}, target {target_crs}")]
    CrsMismatch {
        /// Reference system of the source collection.
        source_crs: Crs,
        /// Reference system of the target collection.
        target_crs: Crs,
    },
    /// A feature has a geometry with zero area.
    #[error("{side} feature {id} has zero area")]
    ZeroArea {
        /// Collection holding the feature.
        side: Side,
        /// Identifier of the degenerate feature.
        id: String,
    },
    /// A feature had an empty identifier.
    #[error("{side} feature at position {position} has an empty identifier")]
    EmptyIdentifier {
        /// Collection holding the feature.
        side: Side,
        /// Zero-based position in the input collection.
        position: usize,
    },
    /// Two features share one identifier.
    #[error("{side} identifier {id} is not unique")]
    DuplicateIdentifier {
        /// Collection holding the features.
        side: Side,
        /// Repeated identifier.
        id: String,
    },
    /// The configured skip attribute exists on no feature.
    #[error("attribute {attribute:?} is not present on any source feature")]
    MissingAttribute {
        /// Name of the absent attribute.
        attribute: String,
    },
    /// Source features overlap each other beyond the configured threshold.
    #[error("{} internally overlapping source pairs: {}", .pairs.len(), join_pairs(.pairs))]
    InternalOverlap {
        /// Offending identifier pairs.
        pairs: Vec<(SourceId, SourceId)>,
    },
}

/// The classifier or action processor detected inconsistent state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// A bucket expected to hold one record per source held several.
    #[error("{bucket} holds more than one record for source ids: {}", join(.source_ids))]
    DuplicateMatch {
        /// Bucket that violated the one-record-per-source rule.
        bucket: Bucket,
        /// Source identifiers with several surviving records.
        source_ids: Vec<SourceId>,
    },
    /// Buckets did not partition the source set.
    #[error(
        "buckets do not partition the source set; missing: [{}], assigned twice: [{}]",
        join(.missing),
        join(.duplicated)
    )]
    IncompletePartition {
        /// Source identifiers assigned to no bucket.
        missing: Vec<SourceId>,
        /// Source identifiers assigned to several buckets.
        duplicated: Vec<SourceId>,
    },
    /// A record referenced a feature absent from the input collections.
    #[error("{side} feature {id} referenced by an overlap record is unknown")]
    UnknownFeature {
        /// Collection expected to hold the feature.
        side: Side,
        /// Identifier of the missing feature.
        id: String,
    },
    /// The identifier source produced a value twice within one run.
    #[error("generated identifier {id} was issued twice")]
    DuplicateGeneratedId {
        /// Repeated identifier.
        id: SourceId,
    },
}

/// A configuration value was out of range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration for {field}: {reason}")]
pub struct ConfigError {
    /// Offending configuration field.
    pub field: &'static str,
    /// Human-readable explanation.
    pub reason: String,
}

/// Failure reconciling one asset type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// Input preconditions were violated.
    #[error("{asset}: precondition failed: {source}")]
    Precondition {
        /// Asset type whose run was aborted.
        asset: AssetType,
        /// Violated precondition.
        #[source]
        source: PreconditionError,
    },
    /// An internal invariant was violated.
    #[error("{asset}: integrity violation: {source}")]
    Integrity {
        /// Asset type whose run was aborted.
        asset: AssetType,
        /// Violated invariant.
        #[source]
        source: IntegrityError,
    },
    /// The match configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReconcileError {
    /// Asset type the failure belongs to, if any.
    #[must_use]
    pub const fn asset(&self) -> Option<AssetType> {
        match self {
            Self::Precondition { asset, .. } | Self::Integrity { asset, .. } => Some(*asset),
            Self::Config(_) => None,
        }
    }
}
