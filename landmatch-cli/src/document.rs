//! JSON documents read and written by the `reconcile` command.
//!
//! The batch document shares one reference system between the target
//! inventory and every source inventory:
//!
//! ```json
//! {
//!   "crs": 28992,
//!   "targets": [{ "id": "T1", "geometry": [...], "elevation": 0 }],
//!   "sources": { "terrain": [{ "id": "{...}", "geometry": [...], "type": "Gras" }] }
//! }
//! ```

use std::collections::BTreeMap;

use landmatch_core::{
    AssetType, BatchInput, BatchReport, Bucket, BucketActions, Crs, FeatureCollection,
    InternalOverlap, OverlapRecord, PlanAudit, SourceFeature, SourceId, TargetFeature, TargetId,
};
use serde::{Deserialize, Serialize};

/// Batch input as stored on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct BatchDocument {
    /// Reference system shared by every feature; absent means unknown.
    #[serde(default)]
    pub(crate) crs: Option<Crs>,
    pub(crate) targets: Vec<TargetFeature>,
    pub(crate) sources: BTreeMap<AssetType, Vec<SourceFeature>>,
}

impl From<BatchDocument> for BatchInput {
    fn from(document: BatchDocument) -> Self {
        let crs = document.crs;
        Self {
            targets: FeatureCollection {
                crs,
                features: document.targets,
            },
            assets: document
                .sources
                .into_iter()
                .map(|(asset, features)| (asset, FeatureCollection { crs, features }))
                .collect(),
        }
    }
}

/// Report written after a batch run.
#[derive(Debug, Serialize)]
pub(crate) struct ReportDocument<'a> {
    pub(crate) success: bool,
    pub(crate) assets: BTreeMap<AssetType, AssetDocument<'a>>,
    pub(crate) internal_overlaps: &'a [InternalOverlap],
}

/// Outcome of one asset type.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum AssetDocument<'a> {
    Reconciled {
        skipped: &'a [SourceId],
        no_matches: &'a [SourceId],
        buckets: BTreeMap<Bucket, Vec<RecordDocument<'a>>>,
        actions: &'a [BucketActions],
        pending_review: &'a [Bucket],
        audit: &'a PlanAudit,
    },
    Failed {
        error: String,
    },
}

/// Overlap record without its intersection geometry.
#[derive(Debug, Serialize)]
pub(crate) struct RecordDocument<'a> {
    source_id: &'a SourceId,
    target_id: &'a TargetId,
    overlap_target: f64,
    overlap_source: f64,
    perfect_match: bool,
    elevation_match: bool,
    targets_per_source: usize,
    sources_per_target: usize,
}

impl<'a> From<&'a OverlapRecord> for RecordDocument<'a> {
    fn from(record: &'a OverlapRecord) -> Self {
        Self {
            source_id: &record.source_id,
            target_id: &record.target_id,
            overlap_target: record.overlap_target,
            overlap_source: record.overlap_source,
            perfect_match: record.perfect_match,
            elevation_match: record.elevation_match,
            targets_per_source: record.targets_per_source,
            sources_per_target: record.sources_per_target,
        }
    }
}

impl<'a> ReportDocument<'a> {
    pub(crate) fn from_report(report: &'a BatchReport) -> Self {
        let assets = report
            .assets
            .iter()
            .map(|(asset, outcome)| {
                let document = match outcome {
                    Ok(asset_report) => {
                        let classification = &asset_report.classification;
                        AssetDocument::Reconciled {
                            skipped: classification.skipped(),
                            no_matches: classification.no_matches(),
                            buckets: classification
                                .buckets()
                                .filter(|bucket| *bucket != Bucket::NoMatches)
                                .map(|bucket| {
                                    let records = classification
                                        .records(bucket)
                                        .iter()
                                        .map(RecordDocument::from)
                                        .collect();
                                    (bucket, records)
                                })
                                .collect(),
                            actions: &asset_report.plan.buckets,
                            pending_review: &asset_report.pending_review,
                            audit: &asset_report.audit,
                        }
                    }
                    Err(err) => AssetDocument::Failed {
                        error: err.to_string(),
                    },
                };
                (*asset, document)
            })
            .collect();
        Self {
            success: report.is_success(),
            assets,
            internal_overlaps: &report.internal_overlaps,
        }
    }
}
