//! Turning classified buckets into reconciliation actions.
//!
//! Each (asset type, bucket) combination maps to a [`ProcessingMode`]:
//!
//! - `only` accepts every record as a pairing;
//! - `remove` keeps the largest source per target and removes the rest,
//!   giving every source exactly one action;
//! - `add` moves each source onto its largest target and creates new features
//!   for the other targets it covers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use geo::MultiPolygon;
use log::{info, warn};

use crate::bucket::Bucket;
use crate::classify::Classification;
use crate::config::ElevationNullPolicy;
use crate::error::{IntegrityError, Side};
use crate::ids::IdGenerator;
use crate::model::{
    AssetType, FeatureCollection, SourceFeature, SourceId, TargetFeature, TargetId,
};
use crate::overlap::OverlapRecord;

/// How a bucket's records become actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ProcessingMode {
    /// Accept every pairing as-is.
    Only,
    /// Keep one source per target; remove the others.
    Remove,
    /// Keep one target per source; create features for the others.
    Add,
}

/// Processing mode configured for `bucket` within `asset`.
///
/// Returns `None` for manual buckets and for combinations an asset type never
/// produces.
#[must_use]
pub const fn processing_mode(asset: AssetType, bucket: Bucket) -> Option<ProcessingMode> {
    match (asset, bucket) {
        (_, Bucket::Geom1To1 | Bucket::Geom75Match)
        | (AssetType::Green, Bucket::HedgeMatch)
        | (AssetType::Pavement, Bucket::GeomOverlap150Match) => Some(ProcessingMode::Only),
        (_, Bucket::GisibMerge) => Some(ProcessingMode::Remove),
        (_, Bucket::GisibSplit) => Some(ProcessingMode::Add),
        _ => None,
    }
}

/// An accepted source–target pairing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pairing {
    /// Source side of the pair.
    pub source_id: SourceId,
    /// Target side of the pair.
    pub target_id: TargetId,
}

/// A duplicate source superseded by another source on the same target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Removal {
    /// Source feature to delete.
    pub source_id: SourceId,
    /// Target both sources cover.
    pub target_id: TargetId,
    /// Source kept for the target.
    pub superseded_by: SourceId,
}

/// A new feature cloned from an existing source onto a target geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Addition {
    /// The new feature, carrying a freshly generated identifier.
    pub feature: SourceFeature,
    /// Source feature whose attributes were copied.
    pub template_id: SourceId,
    /// Target whose geometry the feature takes.
    pub target_id: TargetId,
}

/// An existing source whose boundary becomes the target's.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryChange {
    /// Source feature to update.
    pub source_id: SourceId,
    /// Target supplying the geometry.
    pub target_id: TargetId,
    /// Replacement geometry.
    pub geometry: MultiPolygon<f64>,
}

/// One reconciliation step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "action", rename_all = "snake_case")
)]
pub enum ReconciliationAction {
    /// Accept a pairing as-is.
    Keep(Pairing),
    /// Delete a duplicate source.
    Remove(Removal),
    /// Create a new feature.
    Add(Addition),
    /// Replace a source boundary with its target's.
    ChangeGeometry(GeometryChange),
}

impl ReconciliationAction {
    /// Source feature the action refers to; the template for additions.
    #[must_use]
    pub const fn source_id(&self) -> &SourceId {
        match self {
            Self::Keep(p) => &p.source_id,
            Self::Remove(r) => &r.source_id,
            Self::Add(a) => &a.template_id,
            Self::ChangeGeometry(c) => &c.source_id,
        }
    }

    /// The accepted pairing, for keeps and geometry changes.
    #[must_use]
    pub fn pairing(&self) -> Option<Pairing> {
        match self {
            Self::Keep(p) => Some(p.clone()),
            Self::ChangeGeometry(c) => Some(Pairing {
                source_id: c.source_id.clone(),
                target_id: c.target_id.clone(),
            }),
            Self::Remove(_) | Self::Add(_) => None,
        }
    }
}

/// Actions derived from one bucket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketActions {
    /// Bucket the actions came from.
    pub bucket: Bucket,
    /// Mode used to derive them.
    pub mode: ProcessingMode,
    /// Derived actions.
    pub actions: Vec<ReconciliationAction>,
}

/// Findings from auditing a plan's accepted pairings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanAudit {
    /// Source ids accepted in more than one pairing.
    pub duplicate_sources: Vec<SourceId>,
    /// Target ids accepted in more than one pairing.
    pub duplicate_targets: Vec<TargetId>,
    /// Automatic-bucket source ids without any action.
    pub uncovered_sources: Vec<SourceId>,
    /// Source ids both removed and accepted in a pairing.
    pub removed_and_accepted: Vec<SourceId>,
}

impl PlanAudit {
    /// Whether the audit found nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicate_sources.is_empty()
            && self.duplicate_targets.is_empty()
            && self.uncovered_sources.is_empty()
            && self.removed_and_accepted.is_empty()
    }
}

/// Every action derived for one asset type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconciliationPlan {
    /// Asset type the plan belongs to.
    pub asset: AssetType,
    /// Actions per processed bucket, in evaluation order.
    pub buckets: Vec<BucketActions>,
}

impl ReconciliationPlan {
    /// All actions in bucket order.
    pub fn actions(&self) -> impl Iterator<Item = &ReconciliationAction> {
        self.buckets.iter().flat_map(|b| b.actions.iter())
    }

    /// Accepted pairings: keeps plus geometry changes.
    #[must_use]
    pub fn accepted_pairs(&self) -> Vec<Pairing> {
        self.actions()
            .filter_map(ReconciliationAction::pairing)
            .collect()
    }

    /// Sources to delete.
    #[must_use]
    pub fn removals(&self) -> Vec<&Removal> {
        self.actions()
            .filter_map(|a| match a {
                ReconciliationAction::Remove(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Features to create.
    #[must_use]
    pub fn additions(&self) -> Vec<&Addition> {
        self.actions()
            .filter_map(|a| match a {
                ReconciliationAction::Add(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Boundaries to replace.
    #[must_use]
    pub fn geometry_changes(&self) -> Vec<&GeometryChange> {
        self.actions()
            .filter_map(|a| match a {
                ReconciliationAction::ChangeGeometry(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Check accepted pairings for duplicates and automatic sources for
    /// coverage.
    #[must_use]
    pub fn audit(&self, classification: &Classification) -> PlanAudit {
        let pairs = self.accepted_pairs();
        let duplicate_sources = repeated(pairs.iter().map(|p| &p.source_id));
        let duplicate_targets = repeated(pairs.iter().map(|p| &p.target_id));
        let covered: BTreeSet<&SourceId> =
            self.actions().map(ReconciliationAction::source_id).collect();
        let uncovered_sources = classification
            .buckets()
            .filter(|bucket| bucket.is_automatic())
            .flat_map(|bucket| classification.source_ids(bucket))
            .filter(|id| !covered.contains(id))
            .collect();
        let accepted: BTreeSet<&SourceId> = pairs.iter().map(|p| &p.source_id).collect();
        let removed_and_accepted = self
            .removals()
            .into_iter()
            .map(|r| &r.source_id)
            .filter(|id| accepted.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let audit = PlanAudit {
            duplicate_sources,
            duplicate_targets,
            uncovered_sources,
            removed_and_accepted,
        };
        if !audit.is_clean() {
            warn!(
                "{}: plan audit found {} duplicate sources, {} duplicate targets, {} uncovered sources, {} removed yet accepted sources",
                self.asset,
                audit.duplicate_sources.len(),
                audit.duplicate_targets.len(),
                audit.uncovered_sources.len(),
                audit.removed_and_accepted.len()
            );
        }
        audit
    }
}

fn repeated<'a, T: Ord + Clone + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<T> {
    let mut counts: BTreeMap<&T, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(item, _)| item.clone())
        .collect()
}

/// Derives reconciliation actions for one asset type.
pub struct ActionProcessor<'a> {
    asset: AssetType,
    sources: HashMap<&'a str, &'a SourceFeature>,
    targets: HashMap<&'a str, &'a TargetFeature>,
    ids: &'a dyn IdGenerator,
    elevation_null_policy: ElevationNullPolicy,
}

impl<'a> ActionProcessor<'a> {
    /// Processor resolving features from the run's input collections.
    #[must_use]
    pub fn new(
        asset: AssetType,
        sources: &'a FeatureCollection<SourceFeature>,
        targets: &'a FeatureCollection<TargetFeature>,
        ids: &'a dyn IdGenerator,
    ) -> Self {
        Self {
            asset,
            sources: sources.iter().map(|f| (f.id.as_str(), f)).collect(),
            targets: targets.iter().map(|f| (f.id.as_str(), f)).collect(),
            ids,
            elevation_null_policy: ElevationNullPolicy::default(),
        }
    }

    /// Resolve unknown source elevations with `policy` when grouping
    /// remove-mode records.
    #[must_use]
    pub fn with_elevation_policy(mut self, policy: ElevationNullPolicy) -> Self {
        self.elevation_null_policy = policy;
        self
    }

    fn source(&self, id: &SourceId) -> Result<&'a SourceFeature, IntegrityError> {
        self.sources
            .get(id.as_str())
            .copied()
            .ok_or_else(|| IntegrityError::UnknownFeature {
                side: Side::Source,
                id: id.to_string(),
            })
    }

    fn target(&self, id: &TargetId) -> Result<&'a TargetFeature, IntegrityError> {
        self.targets
            .get(id.as_str())
            .copied()
            .ok_or_else(|| IntegrityError::UnknownFeature {
                side: Side::Target,
                id: id.to_string(),
            })
    }

    /// Derive the actions for one bucket.
    ///
    /// Unconfigured buckets log a warning and empty buckets an info message;
    /// both yield `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`IntegrityError`] when a record names an unknown feature or
    /// the identifier source repeats itself.
    pub fn process_bucket(
        &self,
        bucket: Bucket,
        records: &[OverlapRecord],
    ) -> Result<Option<BucketActions>, IntegrityError> {
        let asset = self.asset;
        let Some(mode) = processing_mode(asset, bucket) else {
            warn!("{asset}: no processing configured for bucket {bucket}");
            return Ok(None);
        };
        if records.is_empty() {
            info!("{asset}: bucket {bucket} is empty");
            return Ok(None);
        }
        info!("{asset}: processing {bucket} ({} records)", records.len());
        let actions = match mode {
            ProcessingMode::Only => Self::only(records),
            ProcessingMode::Remove => self.remove(records),
            ProcessingMode::Add => self.add(records)?,
        };
        self.check_generated(&actions, &mut HashSet::new())?;
        Ok(Some(BucketActions {
            bucket,
            mode,
            actions,
        }))
    }

    /// Derive the actions for every automatic bucket of `classification`.
    ///
    /// # Errors
    /// See [`ActionProcessor::process_bucket`]; additionally fails when two
    /// buckets receive the same generated identifier.
    pub fn plan(&self, classification: &Classification) -> Result<ReconciliationPlan, IntegrityError> {
        let mut buckets = Vec::new();
        for bucket in classification.buckets().filter(|b| b.is_automatic()) {
            if let Some(actions) = self.process_bucket(bucket, classification.records(bucket))? {
                buckets.push(actions);
            }
        }
        let mut issued = HashSet::new();
        for bucket in &buckets {
            self.check_generated(&bucket.actions, &mut issued)?;
        }
        Ok(ReconciliationPlan {
            asset: self.asset,
            buckets,
        })
    }

    fn check_generated<'b>(
        &self,
        actions: &'b [ReconciliationAction],
        issued: &mut HashSet<&'b SourceId>,
    ) -> Result<(), IntegrityError> {
        for action in actions {
            if let ReconciliationAction::Add(addition) = action {
                let id = &addition.feature.id;
                if self.sources.contains_key(id.as_str()) || !issued.insert(id) {
                    return Err(IntegrityError::DuplicateGeneratedId { id: id.clone() });
                }
            }
        }
        Ok(())
    }

    fn only(records: &[OverlapRecord]) -> Vec<ReconciliationAction> {
        records
            .iter()
            .map(|r| {
                ReconciliationAction::Keep(Pairing {
                    source_id: r.source_id.clone(),
                    target_id: r.target_id.clone(),
                })
            })
            .collect()
    }

    /// One action per source: the largest source of each (target, source
    /// elevation) group is kept and every source sharing a group with a
    /// larger kept source is removed. Ties go to the smaller source id.
    ///
    /// A source is kept or removed on its largest group only; its records on
    /// other targets yield no action.
    fn remove(&self, records: &[OverlapRecord]) -> Vec<ReconciliationAction> {
        let mut groups: BTreeMap<(&TargetId, i32), Vec<&SourceId>> = BTreeMap::new();
        let mut areas: BTreeMap<&SourceId, f64> = BTreeMap::new();
        for record in records {
            let elevation = self.elevation_null_policy.resolve(record.source_elevation);
            groups
                .entry((&record.target_id, elevation))
                .or_default()
                .push(&record.source_id);
            areas.entry(&record.source_id).or_insert(record.source_area);
        }
        let mut ranked: Vec<(&SourceId, f64)> = areas.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut kept: BTreeMap<(&TargetId, i32), &SourceId> = BTreeMap::new();
        let mut actions = Vec::with_capacity(ranked.len());
        for (source_id, _) in ranked {
            let member_of: Vec<(&(&TargetId, i32), usize)> = groups
                .iter()
                .filter(|(_, members)| members.contains(&source_id))
                .map(|(key, members)| (key, members.len()))
                .collect();
            let superseding = member_of
                .iter()
                .find_map(|(key, _)| kept.get(*key).map(|winner| (key.0, *winner)));
            if let Some((target_id, winner)) = superseding {
                actions.push(ReconciliationAction::Remove(Removal {
                    source_id: source_id.clone(),
                    target_id: target_id.clone(),
                    superseded_by: winner.clone(),
                }));
                continue;
            }
            let home = member_of
                .iter()
                .max_by(|(a_key, a_len), (b_key, b_len)| {
                    a_len.cmp(b_len).then_with(|| b_key.cmp(a_key))
                })
                .map(|(key, _)| **key);
            if let Some(key) = home {
                kept.insert(key, source_id);
                actions.push(ReconciliationAction::Keep(Pairing {
                    source_id: source_id.clone(),
                    target_id: key.0.clone(),
                }));
            }
        }
        let dropped = records.len() - actions.len();
        if dropped > 0 {
            info!(
                "{}: {dropped} records on secondary targets yield no action",
                self.asset
            );
        }
        actions
    }

    /// Largest target area wins per source; ties go to the smaller target id.
    fn add(&self, records: &[OverlapRecord]) -> Result<Vec<ReconciliationAction>, IntegrityError> {
        let mut by_source: BTreeMap<&SourceId, Vec<&OverlapRecord>> = BTreeMap::new();
        for record in records {
            by_source.entry(&record.source_id).or_default().push(record);
        }
        let mut actions = Vec::with_capacity(records.len());
        for (source_id, mut group) in by_source {
            group.sort_by(|a, b| {
                b.target_area
                    .total_cmp(&a.target_area)
                    .then_with(|| a.target_id.cmp(&b.target_id))
            });
            let template = self.source(source_id)?;
            let mut members = group.into_iter();
            let Some(kept) = members.next() else {
                continue;
            };
            actions.push(ReconciliationAction::ChangeGeometry(GeometryChange {
                source_id: source_id.clone(),
                target_id: kept.target_id.clone(),
                geometry: self.target(&kept.target_id)?.geometry.clone(),
            }));
            for record in members {
                let target = self.target(&record.target_id)?;
                let mut feature = template.clone();
                feature.id = self.ids.generate();
                feature.geometry = target.geometry.clone();
                actions.push(ReconciliationAction::Add(Addition {
                    feature,
                    template_id: source_id.clone(),
                    target_id: record.target_id.clone(),
                }));
            }
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::config::MatchConfig;
    use crate::ids::is_brace_uuid;
    use crate::model::Crs;
    use crate::test_support::{FixedIdGenerator, SequentialIdGenerator, record, square};
    use rstest::{fixture, rstest};

    struct Inputs {
        sources: FeatureCollection<SourceFeature>,
        targets: FeatureCollection<TargetFeature>,
    }

    #[fixture]
    fn inputs() -> Inputs {
        Inputs {
            sources: FeatureCollection::new(
                Crs::epsg(28992),
                vec![
                    SourceFeature::new("{S1}", square(0.0, 0.0, 10.0)).with_kind("Gras"),
                    SourceFeature::new("{S2}", square(10.0, 0.0, 6.0)).with_kind("Gras"),
                    SourceFeature::new("{S3}", square(50.0, 0.0, 10.0))
                        .with_kind("Gras")
                        .with_attribute("neighbourhood", "Centrum"),
                ],
            ),
            targets: FeatureCollection::new(
                Crs::epsg(28992),
                vec![
                    TargetFeature::new("T1", square(0.0, 0.0, 15.0)),
                    TargetFeature::new("T2", square(50.0, 0.0, 8.0)),
                    TargetFeature::new("T3", square(58.0, 0.0, 4.0)),
                ],
            ),
        }
    }

    fn sized(source: &str, target: &str, source_area: f64, target_area: f64) -> OverlapRecord {
        let mut r = record(source, target, 1.0, 1.0);
        r.source_area = source_area;
        r.target_area = target_area;
        r
    }

    #[rstest]
    #[case(AssetType::Terrain, Bucket::Geom1To1, Some(ProcessingMode::Only))]
    #[case(AssetType::Green, Bucket::HedgeMatch, Some(ProcessingMode::Only))]
    #[case(AssetType::Pavement, Bucket::GeomOverlap150Match, Some(ProcessingMode::Only))]
    #[case(AssetType::Terrain, Bucket::GeomOverlap150Match, None)]
    #[case(AssetType::Green, Bucket::GisibMerge, Some(ProcessingMode::Remove))]
    #[case(AssetType::Pavement, Bucket::GisibSplit, Some(ProcessingMode::Add))]
    #[case(AssetType::Terrain, Bucket::BgtSplit, None)]
    #[case(AssetType::Terrain, Bucket::Remaining, None)]
    fn dispatch_table(
        #[case] asset: AssetType,
        #[case] bucket: Bucket,
        #[case] expected: Option<ProcessingMode>,
    ) {
        assert_eq!(processing_mode(asset, bucket), expected);
    }

    #[rstest]
    fn unconfigured_and_empty_buckets_yield_nothing(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let clip = processor
            .process_bucket(Bucket::ClipMatch, &[record("{S1}", "T1", 0.3, 0.9)])
            .expect("clip");
        assert_eq!(clip, None);
        let empty = processor
            .process_bucket(Bucket::Geom1To1, &[])
            .expect("empty");
        assert_eq!(empty, None);
    }

    #[rstest]
    fn remove_keeps_the_larger_source(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [sized("{S2}", "T1", 36.0, 225.0), sized("{S1}", "T1", 100.0, 225.0)];
        let actions = processor
            .process_bucket(Bucket::GisibMerge, &records)
            .expect("merge")
            .expect("actions");
        assert_eq!(actions.mode, ProcessingMode::Remove);
        assert_eq!(
            actions.actions,
            vec![
                ReconciliationAction::Keep(Pairing {
                    source_id: "{S1}".into(),
                    target_id: "T1".into(),
                }),
                ReconciliationAction::Remove(Removal {
                    source_id: "{S2}".into(),
                    target_id: "T1".into(),
                    superseded_by: "{S1}".into(),
                }),
            ]
        );
    }

    #[rstest]
    fn remove_breaks_area_ties_by_source_id(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [sized("{S2}", "T1", 50.0, 225.0), sized("{S1}", "T1", 50.0, 225.0)];
        let actions = processor
            .process_bucket(Bucket::GisibMerge, &records)
            .expect("merge")
            .expect("actions");
        assert_eq!(
            actions.actions.first().map(ReconciliationAction::source_id),
            Some(&SourceId::from("{S1}"))
        );
    }

    #[rstest]
    fn removed_source_gets_no_pairing_on_its_other_targets(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [
            sized("{S2}", "T1", 94.5, 200.0),
            sized("{S1}", "T1", 100.0, 200.0),
            sized("{S2}", "T2", 94.5, 0.6),
        ];
        let actions = processor
            .process_bucket(Bucket::GisibMerge, &records)
            .expect("merge")
            .expect("actions");
        assert_eq!(
            actions.actions,
            vec![
                ReconciliationAction::Keep(Pairing {
                    source_id: "{S1}".into(),
                    target_id: "T1".into(),
                }),
                ReconciliationAction::Remove(Removal {
                    source_id: "{S2}".into(),
                    target_id: "T1".into(),
                    superseded_by: "{S1}".into(),
                }),
            ]
        );
    }

    #[rstest]
    fn remove_groups_by_source_elevation(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let mut bridge = sized("{S2}", "T1", 36.0, 225.0);
        bridge.source_elevation = Some(1);
        let records = [sized("{S1}", "T1", 100.0, 225.0), bridge];
        let actions = processor
            .process_bucket(Bucket::GisibMerge, &records)
            .expect("merge")
            .expect("actions");
        assert!(
            actions
                .actions
                .iter()
                .all(|a| matches!(a, ReconciliationAction::Keep(_)))
        );
        assert_eq!(actions.actions.len(), 2);
    }

    #[rstest]
    fn audit_reports_sources_both_removed_and_accepted(inputs: Inputs) {
        let classification = Classifier::new(AssetType::Terrain, MatchConfig::default())
            .classify(&inputs.sources, &inputs.targets)
            .expect("classification");
        let plan = ReconciliationPlan {
            asset: AssetType::Terrain,
            buckets: vec![BucketActions {
                bucket: Bucket::GisibMerge,
                mode: ProcessingMode::Remove,
                actions: vec![
                    ReconciliationAction::Keep(Pairing {
                        source_id: "{S1}".into(),
                        target_id: "T1".into(),
                    }),
                    ReconciliationAction::Remove(Removal {
                        source_id: "{S2}".into(),
                        target_id: "T1".into(),
                        superseded_by: "{S1}".into(),
                    }),
                    ReconciliationAction::Keep(Pairing {
                        source_id: "{S2}".into(),
                        target_id: "T2".into(),
                    }),
                ],
            }],
        };
        let audit = plan.audit(&classification);
        assert_eq!(audit.removed_and_accepted, vec![SourceId::from("{S2}")]);
        assert!(!audit.is_clean());
    }

    #[rstest]
    fn add_moves_source_to_larger_target_and_clones_the_rest(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [sized("{S3}", "T3", 100.0, 16.0), sized("{S3}", "T2", 100.0, 64.0)];
        let actions = processor
            .process_bucket(Bucket::GisibSplit, &records)
            .expect("split")
            .expect("actions");
        let [
            ReconciliationAction::ChangeGeometry(change),
            ReconciliationAction::Add(addition),
        ] = actions.actions.as_slice()
        else {
            panic!("unexpected actions: {:?}", actions.actions);
        };
        assert_eq!(change.target_id.as_str(), "T2");
        assert_eq!(change.geometry, square(50.0, 0.0, 8.0));
        assert_eq!(addition.target_id.as_str(), "T3");
        assert_eq!(addition.template_id.as_str(), "{S3}");
        assert_eq!(
            addition.feature.id.as_str(),
            "{00000000-0000-0000-0000-000000000001}"
        );
        assert!(is_brace_uuid(addition.feature.id.as_str()));
        assert_eq!(addition.feature.geometry, square(58.0, 0.0, 4.0));
        assert_eq!(addition.feature.attribute("neighbourhood"), Some("Centrum"));
        assert_eq!(addition.feature.kind.as_deref(), Some("Gras"));
    }

    #[rstest]
    fn repeated_generated_ids_are_an_integrity_error(inputs: Inputs) {
        let ids = FixedIdGenerator("{00000000-0000-0000-0000-00000000000A}".into());
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [
            sized("{S3}", "T1", 100.0, 225.0),
            sized("{S3}", "T2", 100.0, 64.0),
            sized("{S3}", "T3", 100.0, 16.0),
        ];
        let err = processor
            .process_bucket(Bucket::GisibSplit, &records)
            .expect_err("duplicate id");
        assert!(matches!(err, IntegrityError::DuplicateGeneratedId { .. }));
    }

    #[rstest]
    fn unknown_target_is_an_integrity_error(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Terrain, &inputs.sources, &inputs.targets, &ids);
        let records = [sized("{S3}", "T2", 100.0, 64.0), sized("{S3}", "T9", 100.0, 1.0)];
        let err = processor
            .process_bucket(Bucket::GisibSplit, &records)
            .expect_err("unknown target");
        assert_eq!(
            err,
            IntegrityError::UnknownFeature {
                side: Side::Target,
                id: "T9".to_owned()
            }
        );
    }

    #[rstest]
    fn only_mode_accepts_pairs_verbatim(inputs: Inputs) {
        let ids = SequentialIdGenerator::new();
        let processor =
            ActionProcessor::new(AssetType::Pavement, &inputs.sources, &inputs.targets, &ids);
        let actions = processor
            .process_bucket(
                Bucket::GeomOverlap150Match,
                &[record("{S1}", "T1", 0.6, 0.95)],
            )
            .expect("only")
            .expect("actions");
        assert_eq!(actions.mode, ProcessingMode::Only);
        assert_eq!(actions.actions.len(), 1);
    }
}
