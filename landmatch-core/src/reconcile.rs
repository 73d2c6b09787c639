//! End-to-end reconciliation of one asset type or a whole batch.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::actions::{ActionProcessor, PlanAudit, ReconciliationPlan};
use crate::bucket::Bucket;
use crate::classify::{Classification, Classifier};
use crate::config::{InternalOverlapPolicy, MatchConfig};
use crate::error::{ConfigError, PreconditionError, ReconcileError};
use crate::ids::IdGenerator;
use crate::model::{AssetType, FeatureCollection, SourceFeature, TargetFeature};
use crate::validate::{InternalOverlap, find_internal_overlaps};

/// Source inventories per asset type plus the shared target inventory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchInput {
    /// Authoritative features every asset type is matched against.
    pub targets: FeatureCollection<TargetFeature>,
    /// Source features per asset type.
    pub assets: BTreeMap<AssetType, FeatureCollection<SourceFeature>>,
}

/// Outcome of reconciling one asset type.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetReport {
    /// Bucket assignment.
    pub classification: Classification,
    /// Derived actions.
    pub plan: ReconciliationPlan,
    /// Manual buckets that still need review.
    pub pending_review: Vec<Bucket>,
    /// Findings from auditing the plan.
    pub audit: PlanAudit,
}

/// Outcome of a batch run. One asset type failing never affects another.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Per-asset result in [`AssetType`] order.
    pub assets: BTreeMap<AssetType, Result<AssetReport, ReconcileError>>,
    /// Internally overlapping source pairs found across the batch.
    pub internal_overlaps: Vec<InternalOverlap>,
}

impl BatchReport {
    /// Errors of the asset types that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ReconcileError> {
        self.assets.values().filter_map(|result| result.as_ref().err())
    }

    /// Whether every asset type succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Classify one asset type and derive its reconciliation actions.
///
/// # Errors
/// Returns [`ReconcileError`] when the configuration is invalid, the input
/// violates a precondition, or an integrity check fails.
pub fn reconcile_asset(
    asset: AssetType,
    sources: &FeatureCollection<SourceFeature>,
    targets: &FeatureCollection<TargetFeature>,
    config: &MatchConfig,
    ids: &dyn IdGenerator,
) -> Result<AssetReport, ReconcileError> {
    config.validate()?;
    let classification = Classifier::new(asset, config.clone()).classify(sources, targets)?;
    let plan = ActionProcessor::new(asset, sources, targets, ids)
        .with_elevation_policy(config.elevation_null_policy)
        .plan(&classification)
        .map_err(|source| ReconcileError::Integrity { asset, source })?;
    let audit = plan.audit(&classification);
    let pending_review = classification.pending_review(&config.skip_types);
    info!(
        "{asset}: {} accepted pairs, {} removals, {} additions, {} geometry changes",
        plan.accepted_pairs().len(),
        plan.removals().len(),
        plan.additions().len(),
        plan.geometry_changes().len()
    );
    Ok(AssetReport {
        classification,
        plan,
        pending_review,
        audit,
    })
}

/// Reconcile every asset type of `input` independently.
///
/// Internal source overlaps are checked first according to
/// [`MatchConfig::internal_overlap_policy`]; under
/// [`InternalOverlapPolicy::Reject`] the asset types involved fail with
/// [`PreconditionError::InternalOverlap`] while the others proceed.
///
/// # Errors
/// Returns [`ConfigError`] when the configuration is invalid; per-asset
/// failures are reported inside the [`BatchReport`].
pub fn reconcile_batch(
    input: &BatchInput,
    config: &MatchConfig,
    ids: &dyn IdGenerator,
) -> Result<BatchReport, ConfigError> {
    config.validate()?;
    let policy = config.internal_overlap_policy;
    let internal_overlaps = if policy == InternalOverlapPolicy::Ignore {
        Vec::new()
    } else {
        find_internal_overlaps(&input.assets, config)
    };
    for overlap in &internal_overlaps {
        warn!(
            "internal overlap: {} {} and {} {} share {:.1}% / {:.1}%",
            overlap.first.asset,
            overlap.first.id,
            overlap.second.asset,
            overlap.second.id,
            overlap.first_ratio * 100.0,
            overlap.second_ratio * 100.0
        );
    }

    let mut assets = BTreeMap::new();
    for (&asset, sources) in &input.assets {
        info!("{asset}: reconciling {} source features", sources.len());
        let involved: Vec<&InternalOverlap> = internal_overlaps
            .iter()
            .filter(|overlap| overlap.involves(asset))
            .collect();
        let result = if policy == InternalOverlapPolicy::Reject && !involved.is_empty() {
            Err(ReconcileError::Precondition {
                asset,
                source: PreconditionError::InternalOverlap {
                    pairs: involved
                        .iter()
                        .map(|o| (o.first.id.clone(), o.second.id.clone()))
                        .collect(),
                },
            })
        } else {
            reconcile_asset(asset, sources, &input.targets, config, ids)
        };
        if let Err(err) = &result {
            warn!("{err}");
        }
        assets.insert(asset, result);
    }
    Ok(BatchReport {
        assets,
        internal_overlaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Side;
    use crate::model::{Crs, SourceId};
    use crate::test_support::{SequentialIdGenerator, rect, square};
    use rstest::{fixture, rstest};

    #[fixture]
    fn input() -> BatchInput {
        let crs = Crs::epsg(28992);
        BatchInput {
            targets: FeatureCollection::new(
                crs,
                vec![
                    TargetFeature::new("T1", square(0.0, 0.0, 10.0)),
                    TargetFeature::new("T2", square(20.0, 0.0, 10.0)),
                ],
            ),
            assets: BTreeMap::from([
                (
                    AssetType::Terrain,
                    FeatureCollection::new(
                        crs,
                        vec![SourceFeature::new("{A}", square(0.0, 0.0, 10.0))],
                    ),
                ),
                (
                    AssetType::Pavement,
                    FeatureCollection::new(
                        crs,
                        vec![SourceFeature::new("{P}", square(20.0, 0.0, 10.0))],
                    ),
                ),
            ]),
        }
    }

    #[rstest]
    fn batch_reconciles_every_asset(input: BatchInput) {
        let ids = SequentialIdGenerator::new();
        let report = reconcile_batch(&input, &MatchConfig::default(), &ids).expect("batch");
        assert!(report.is_success());
        assert!(report.internal_overlaps.is_empty());
        let terrain = report
            .assets
            .get(&AssetType::Terrain)
            .and_then(|r| r.as_ref().ok())
            .expect("terrain report");
        assert_eq!(terrain.plan.accepted_pairs().len(), 1);
        assert!(terrain.audit.is_clean());
    }

    #[rstest]
    fn one_failing_asset_does_not_stop_the_batch(mut input: BatchInput) {
        if let Some(pavement) = input.assets.get_mut(&AssetType::Pavement) {
            pavement.crs = None;
        }
        let ids = SequentialIdGenerator::new();
        let report = reconcile_batch(&input, &MatchConfig::default(), &ids).expect("batch");
        assert!(!report.is_success());
        assert!(matches!(
            report.assets.get(&AssetType::Terrain),
            Some(Ok(_))
        ));
        assert_eq!(
            report.assets.get(&AssetType::Pavement),
            Some(&Err(ReconcileError::Precondition {
                asset: AssetType::Pavement,
                source: PreconditionError::MissingCrs { side: Side::Source },
            }))
        );
    }

    #[rstest]
    fn reject_policy_fails_only_involved_assets(mut input: BatchInput) {
        input.assets.insert(
            AssetType::Green,
            FeatureCollection::new(
                Crs::epsg(28992),
                vec![SourceFeature::new("{G}", square(20.0, 0.0, 10.0))],
            ),
        );
        let config = MatchConfig {
            internal_overlap_policy: InternalOverlapPolicy::Reject,
            ..MatchConfig::default()
        };
        let ids = SequentialIdGenerator::new();
        let report = reconcile_batch(&input, &config, &ids).expect("batch");
        assert_eq!(report.internal_overlaps.len(), 1);
        assert!(matches!(report.assets.get(&AssetType::Terrain), Some(Ok(_))));
        assert_eq!(report.failures().count(), 2);
        for failure in report.failures() {
            assert!(matches!(
                failure,
                ReconcileError::Precondition {
                    source: PreconditionError::InternalOverlap { .. },
                    ..
                }
            ));
        }
    }

    #[rstest]
    fn merged_source_overlapping_another_target_is_only_removed() {
        let crs = Crs::epsg(28992);
        let sources = FeatureCollection::new(
            crs,
            vec![
                SourceFeature::new("{A}", rect(1.0, 0.0, 10.0, 10.5)),
                SourceFeature::new("{B}", rect(10.0, 0.0, 20.0, 10.0)),
            ],
        );
        let targets = FeatureCollection::new(
            crs,
            vec![
                TargetFeature::new("T1", rect(0.0, 0.0, 20.0, 10.0)),
                TargetFeature::new("T2", rect(1.0, 10.0, 2.0, 10.6)),
            ],
        );
        let ids = SequentialIdGenerator::new();
        let report = reconcile_asset(
            AssetType::Terrain,
            &sources,
            &targets,
            &MatchConfig::default(),
            &ids,
        )
        .expect("report");
        assert_eq!(
            report.classification.bucket_of(&SourceId::from("{A}")),
            Some(Bucket::GisibMerge)
        );
        let removed: Vec<&SourceId> = report.plan.removals().iter().map(|r| &r.source_id).collect();
        assert_eq!(removed, vec![&SourceId::from("{A}")]);
        let kept: Vec<SourceId> = report
            .plan
            .accepted_pairs()
            .into_iter()
            .map(|p| p.source_id)
            .collect();
        assert_eq!(kept, vec![SourceId::from("{B}")]);
        assert!(report.audit.is_clean(), "audit: {:?}", report.audit);
    }

    #[rstest]
    fn invalid_configuration_is_rejected_up_front(input: BatchInput) {
        let config = MatchConfig {
            min_overlap_ratio: 2.0,
            ..MatchConfig::default()
        };
        let ids = SequentialIdGenerator::new();
        let err = reconcile_batch(&input, &config, &ids).expect_err("invalid config");
        assert_eq!(err.field, "min_overlap_ratio");
    }
}
