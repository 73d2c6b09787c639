//! The waterfall classifier.
//!
//! Overlap records live in one arena for the whole run. Each rule receives
//! the indices still unclaimed and returns the indices it claims per bucket
//! plus the indices left for the next rule. Claims are by source id: once a
//! source id lands in a bucket, none of its records reach later rules.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{info, warn};

use crate::bucket::Bucket;
use crate::cardinality::add_intersection_counts;
use crate::config::MatchConfig;
use crate::error::{IntegrityError, PreconditionError, ReconcileError};
use crate::model::{AssetType, FeatureCollection, SourceFeature, SourceId, TargetFeature};
use crate::overlap::{
    OverlapRecord, annotate_match_flags, compute_overlaps, filter_overlap_min_ratio,
};
use crate::profile::{AssetProfile, Rule};

/// Read-only state shared by every rule.
#[derive(Debug)]
pub struct StageContext<'a> {
    /// Record arena; rules refer to records by index.
    pub records: &'a [OverlapRecord],
    /// Source features by identifier.
    pub sources: &'a HashMap<&'a str, &'a SourceFeature>,
    /// Active thresholds.
    pub config: &'a MatchConfig,
}

impl<'a> StageContext<'a> {
    fn record(&self, index: usize) -> Option<&'a OverlapRecord> {
        self.records.get(index)
    }

    fn source_of(&self, index: usize) -> Option<&'a str> {
        self.record(index).map(|r| r.source_id.as_str())
    }

    fn feature(&self, id: &str) -> Option<&'a SourceFeature> {
        self.sources.get(id).copied()
    }

    fn both_above(&self, record: &OverlapRecord, threshold: f64) -> bool {
        record.overlap_target > threshold && record.overlap_source > threshold
    }
}

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageOutcome {
    /// Claimed record indices per bucket, in the rule's bucket order.
    pub claimed: Vec<(Bucket, Vec<usize>)>,
    /// Record indices left for later rules, in input order.
    pub remaining: Vec<usize>,
    /// Records of claimed sources that were not claimed themselves; they
    /// reach no bucket.
    pub dropped: Vec<usize>,
}

/// Split `remaining` by whether the record's source id is in `ids`.
fn split_by_source(
    ctx: &StageContext<'_>,
    remaining: &[usize],
    ids: &BTreeSet<&str>,
) -> (Vec<usize>, Vec<usize>) {
    remaining
        .iter()
        .partition(|&&index| ctx.source_of(index).is_some_and(|id| ids.contains(id)))
}

fn source_ids<'a>(ctx: &StageContext<'a>, indices: &[usize]) -> BTreeSet<&'a str> {
    indices
        .iter()
        .filter_map(|&index| ctx.source_of(index))
        .collect()
}

/// Keep the first index per source id, preserving order.
fn first_per_source(ctx: &StageContext<'_>, indices: Vec<usize>) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    indices
        .into_iter()
        .filter(|&index| ctx.source_of(index).is_some_and(|id| seen.insert(id)))
        .collect()
}

/// Members of `of_claimed` that are not in `claimed`.
fn unclaimed(of_claimed: &[usize], claimed: &[usize]) -> Vec<usize> {
    of_claimed
        .iter()
        .copied()
        .filter(|index| !claimed.contains(index))
        .collect()
}

/// Claim `claimed` for `bucket`; the other records of its sources are dropped.
fn claim_by_source(
    ctx: &StageContext<'_>,
    bucket: Bucket,
    claimed: Vec<usize>,
    remaining: &[usize],
) -> StageOutcome {
    let ids = source_ids(ctx, &claimed);
    let (of_claimed, remaining) = split_by_source(ctx, remaining, &ids);
    StageOutcome {
        dropped: unclaimed(&of_claimed, &claimed),
        claimed: vec![(bucket, claimed)],
        remaining,
    }
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> usize {
    values.collect::<BTreeSet<_>>().len()
}

#[derive(Debug, Default)]
struct Group<'a> {
    members: Vec<usize>,
    sum: f64,
    mean_total: f64,
    counterparts: BTreeSet<&'a str>,
}

impl Group<'_> {
    fn mean(&self) -> f64 {
        if self.members.is_empty() {
            0.0
        } else {
            self.mean_total / self.members.len() as f64
        }
    }
}

impl Rule {
    /// Apply the rule to the unclaimed records.
    ///
    /// # Errors
    /// Returns [`IntegrityError::DuplicateMatch`] when [`Rule::GeomMatch`]
    /// finds several qualifying records for one source id.
    pub fn apply(
        self,
        ctx: &StageContext<'_>,
        remaining: &[usize],
    ) -> Result<StageOutcome, IntegrityError> {
        match self {
            Self::OneToOne => Ok(one_to_one(ctx, remaining)),
            Self::TargetGroups => Ok(target_groups(ctx, remaining)),
            Self::SourceGroups => Ok(source_groups(ctx, remaining)),
            Self::GeomMatch => geom_match(ctx, remaining),
            Self::CombinedOverlap => Ok(combined_overlap(ctx, remaining)),
            Self::Clip => Ok(clip(ctx, remaining)),
        }
    }
}

fn one_to_one(ctx: &StageContext<'_>, remaining: &[usize]) -> StageOutcome {
    let threshold = ctx.config.geom_match_threshold;
    let (claimed, rest): (Vec<usize>, Vec<usize>) = remaining.iter().partition(|&&index| {
        ctx.record(index).is_some_and(|r| {
            r.targets_per_source == 1 && r.sources_per_target == 1 && ctx.both_above(r, threshold)
        })
    });
    let ids = source_ids(ctx, &claimed);
    let (dropped, remaining) = split_by_source(ctx, &rest, &ids);
    StageOutcome {
        claimed: vec![(Bucket::Geom1To1, claimed)],
        remaining,
        dropped,
    }
}

/// Several sources jointly covering one target, grouped per source elevation.
fn target_groups(ctx: &StageContext<'_>, remaining: &[usize]) -> StageOutcome {
    let band = ctx.config.near_unity_band;
    let mut groups: BTreeMap<(&str, i32), Group<'_>> = BTreeMap::new();
    for &index in remaining {
        let Some(record) = ctx.record(index) else {
            continue;
        };
        let key = (
            record.target_id.as_str(),
            ctx.config.elevation(record.source_elevation),
        );
        let group = groups.entry(key).or_default();
        group.members.push(index);
        group.sum += record.overlap_target;
        group.mean_total += record.overlap_source;
        group.counterparts.insert(record.source_id.as_str());
    }

    let mut merge = BTreeSet::new();
    let mut split = BTreeSet::new();
    for group in groups.values() {
        if group.members.len() < 2 || !band.contains(group.sum) || !band.contains(group.mean()) {
            continue;
        }
        let members: Vec<Option<&SourceFeature>> = group
            .counterparts
            .iter()
            .map(|id| ctx.feature(id))
            .collect();
        let maintainers = distinct(members.iter().map(|f| f.and_then(|f| f.maintainer.as_deref())));
        let detailed_kinds =
            distinct(members.iter().map(|f| f.and_then(|f| f.detailed_kind.as_deref())));
        let detailed_maintainers = distinct(
            members
                .iter()
                .map(|f| f.and_then(|f| f.detailed_maintainer.as_deref())),
        );
        let target = if maintainers == 1 && detailed_kinds == 1 && detailed_maintainers < 2 {
            &mut merge
        } else {
            &mut split
        };
        target.extend(group.counterparts.iter().copied());
    }
    split.retain(|id| !merge.contains(id));

    let (merged, rest) = split_by_source(ctx, remaining, &merge);
    let (split_target, remaining) = split_by_source(ctx, &rest, &split);
    StageOutcome {
        claimed: vec![(Bucket::GisibMerge, merged), (Bucket::BgtSplit, split_target)],
        remaining,
        dropped: Vec::new(),
    }
}

/// One source covering several targets, grouped per target elevation.
fn source_groups(ctx: &StageContext<'_>, remaining: &[usize]) -> StageOutcome {
    let band = ctx.config.near_unity_band;
    let mut groups: BTreeMap<(&str, i32), Group<'_>> = BTreeMap::new();
    for &index in remaining {
        let Some(record) = ctx.record(index) else {
            continue;
        };
        let key = (
            record.source_id.as_str(),
            ctx.config.elevation(record.target_elevation),
        );
        let group = groups.entry(key).or_default();
        group.members.push(index);
        group.sum += record.overlap_source;
        group.mean_total += record.overlap_target;
        group.counterparts.insert(record.target_id.as_str());
    }

    let split: BTreeSet<&str> = groups
        .iter()
        .filter(|(_, g)| g.members.len() > 1 && band.contains(g.sum) && band.contains(g.mean()))
        .map(|((source, _), _)| *source)
        .collect();
    let (claimed, remaining) = split_by_source(ctx, remaining, &split);
    StageOutcome {
        claimed: vec![(Bucket::GisibSplit, claimed)],
        remaining,
        dropped: Vec::new(),
    }
}

fn geom_match(
    ctx: &StageContext<'_>,
    remaining: &[usize],
) -> Result<StageOutcome, IntegrityError> {
    let threshold = ctx.config.geom_match_threshold;
    let matched: Vec<usize> = remaining
        .iter()
        .copied()
        .filter(|&index| ctx.record(index).is_some_and(|r| ctx.both_above(r, threshold)))
        .collect();

    let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
    for &index in &matched {
        if let Some(id) = ctx.source_of(index) {
            *per_source.entry(id).or_default() += 1;
        }
    }
    let duplicated: Vec<SourceId> = per_source
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| SourceId::from(id))
        .collect();
    if !duplicated.is_empty() {
        return Err(IntegrityError::DuplicateMatch {
            bucket: Bucket::Geom75Match,
            source_ids: duplicated,
        });
    }

    let ids = source_ids(ctx, &matched);
    let (of_matched, remaining) = split_by_source(ctx, remaining, &ids);
    Ok(StageOutcome {
        dropped: unclaimed(&of_matched, &matched),
        claimed: vec![(Bucket::Geom75Match, matched)],
        remaining,
    })
}

/// Smallest qualifying ratio sum wins per source.
fn combined_overlap(ctx: &StageContext<'_>, remaining: &[usize]) -> StageOutcome {
    let threshold = ctx.config.combined_overlap_threshold;
    let mut candidates: Vec<(usize, f64)> = remaining
        .iter()
        .filter_map(|&index| ctx.record(index).map(|r| (index, r.combined_overlap())))
        .filter(|(_, sum)| *sum > threshold)
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
    let claimed = first_per_source(ctx, candidates.into_iter().map(|(index, _)| index).collect());
    claim_by_source(ctx, Bucket::GeomOverlap150Match, claimed, remaining)
}

/// Elevation-matching clips are preferred; one record per source.
fn clip(ctx: &StageContext<'_>, remaining: &[usize]) -> StageOutcome {
    let config = ctx.config;
    let mut candidates: Vec<usize> = remaining
        .iter()
        .copied()
        .filter(|&index| {
            ctx.record(index).is_some_and(|r| {
                r.overlap_target < config.clip_target_max
                    && r.overlap_source > config.clip_overlap_threshold
            })
        })
        .collect();
    candidates.sort_by_key(|&index| !ctx.record(index).is_some_and(|r| r.elevation_match));
    claim_by_source(ctx, Bucket::ClipMatch, first_per_source(ctx, candidates), remaining)
}

/// Classification of one asset type's source features.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    asset: AssetType,
    no_matches: Vec<SourceId>,
    skipped: Vec<SourceId>,
    buckets: BTreeMap<Bucket, Vec<OverlapRecord>>,
    kinds: BTreeMap<SourceId, Option<String>>,
}

impl Classification {
    /// Asset type this classification belongs to.
    #[must_use]
    pub const fn asset(&self) -> AssetType {
        self.asset
    }

    /// Source features without any surviving overlap.
    #[must_use]
    pub fn no_matches(&self) -> &[SourceId] {
        &self.no_matches
    }

    /// Source features excluded by the skip filter before classification.
    #[must_use]
    pub fn skipped(&self) -> &[SourceId] {
        &self.skipped
    }

    /// Records assigned to `bucket`; empty for `no_matches`.
    #[must_use]
    pub fn records(&self, bucket: Bucket) -> &[OverlapRecord] {
        self.buckets.get(&bucket).map_or(&[], Vec::as_slice)
    }

    /// Buckets produced by this run's profile, in evaluation order.
    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        std::iter::once(Bucket::NoMatches).chain(self.buckets.keys().copied())
    }

    /// Distinct source ids in `bucket`, in first-appearance order.
    #[must_use]
    pub fn source_ids(&self, bucket: Bucket) -> Vec<SourceId> {
        if bucket == Bucket::NoMatches {
            return self.no_matches.clone();
        }
        let mut seen = BTreeSet::new();
        self.records(bucket)
            .iter()
            .filter(|r| seen.insert(&r.source_id))
            .map(|r| r.source_id.clone())
            .collect()
    }

    /// Bucket holding `id`, if it was classified.
    #[must_use]
    pub fn bucket_of(&self, id: &SourceId) -> Option<Bucket> {
        if self.no_matches.contains(id) {
            return Some(Bucket::NoMatches);
        }
        self.buckets
            .iter()
            .find(|(_, records)| records.iter().any(|r| &r.source_id == id))
            .map(|(bucket, _)| *bucket)
    }

    /// Map from every classified source id to its bucket.
    #[must_use]
    pub fn assignment(&self) -> BTreeMap<SourceId, Bucket> {
        self.buckets()
            .flat_map(|bucket| {
                self.source_ids(bucket)
                    .into_iter()
                    .map(move |id| (id, bucket))
            })
            .collect()
    }

    /// Non-empty manual buckets holding at least one source whose `type` is
    /// not in `skip_types`.
    #[must_use]
    pub fn pending_review(&self, skip_types: &BTreeSet<String>) -> Vec<Bucket> {
        self.buckets()
            .filter(|bucket| !bucket.is_automatic())
            .filter(|&bucket| {
                self.source_ids(bucket).iter().any(|id| {
                    self.kinds
                        .get(id)
                        .and_then(Option::as_deref)
                        .is_none_or(|kind| !skip_types.contains(kind))
                })
            })
            .collect()
    }

    fn check_partition(&self, expected: &[SourceId]) -> Result<(), IntegrityError> {
        let mut counts: BTreeMap<SourceId, usize> = BTreeMap::new();
        for bucket in self.buckets() {
            for id in self.source_ids(bucket) {
                *counts.entry(id).or_default() += 1;
            }
        }
        let missing: Vec<SourceId> = expected
            .iter()
            .filter(|id| !counts.contains_key(*id))
            .cloned()
            .collect();
        let duplicated: Vec<SourceId> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();
        if missing.is_empty() && duplicated.is_empty() {
            Ok(())
        } else {
            Err(IntegrityError::IncompletePartition {
                missing,
                duplicated,
            })
        }
    }
}

/// Runs the full pipeline for one asset type.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use landmatch_core::{AssetType, Bucket, Classifier, Crs, FeatureCollection, MatchConfig, SourceFeature, TargetFeature};
///
/// let square = |x: f64| Rect::new(Coord { x, y: 0.0 }, Coord { x: x + 10.0, y: 10.0 }).to_polygon();
/// let sources = FeatureCollection::new(
///     Crs::epsg(28992),
///     vec![SourceFeature::new("{A}", square(0.0)), SourceFeature::new("{B}", square(50.0))],
/// );
/// let targets = FeatureCollection::new(Crs::epsg(28992), vec![TargetFeature::new("T1", square(0.5))]);
///
/// let classification = Classifier::new(AssetType::Terrain, MatchConfig::default())
///     .classify(&sources, &targets)?;
/// assert_eq!(classification.bucket_of(&"{A}".into()), Some(Bucket::Geom1To1));
/// assert_eq!(classification.bucket_of(&"{B}".into()), Some(Bucket::NoMatches));
/// # Ok::<(), landmatch_core::ReconcileError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    asset: AssetType,
    config: MatchConfig,
    profile: AssetProfile,
}

impl Classifier {
    /// Classifier for `asset` using its standard profile.
    #[must_use]
    pub fn new(asset: AssetType, config: MatchConfig) -> Self {
        Self::with_profile(asset, config, AssetProfile::for_asset(asset))
    }

    /// Classifier with an explicit profile.
    #[must_use]
    pub const fn with_profile(asset: AssetType, config: MatchConfig, profile: AssetProfile) -> Self {
        Self {
            asset,
            config,
            profile,
        }
    }

    /// Asset type being classified.
    #[must_use]
    pub const fn asset(&self) -> AssetType {
        self.asset
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Active profile.
    #[must_use]
    pub const fn profile(&self) -> &AssetProfile {
        &self.profile
    }

    fn precondition(&self, source: PreconditionError) -> ReconcileError {
        ReconcileError::Precondition {
            asset: self.asset,
            source,
        }
    }

    fn integrity(&self, source: IntegrityError) -> ReconcileError {
        ReconcileError::Integrity {
            asset: self.asset,
            source,
        }
    }

    /// Remove source features whose skip attribute is a configured skip type.
    ///
    /// # Errors
    /// Returns [`PreconditionError::MissingAttribute`] when skip types are
    /// configured but no source feature carries the skip attribute.
    pub fn apply_skip_filter(
        &self,
        sources: &FeatureCollection<SourceFeature>,
    ) -> Result<(FeatureCollection<SourceFeature>, Vec<SourceId>), PreconditionError> {
        let config = &self.config;
        if config.skip_types.is_empty() {
            return Ok((sources.clone(), Vec::new()));
        }
        let attribute = config.skip_attribute.as_str();
        if !sources.is_empty() && !sources.iter().any(|f| f.has_attribute(attribute)) {
            return Err(PreconditionError::MissingAttribute {
                attribute: attribute.to_owned(),
            });
        }
        let present: BTreeSet<&str> = sources.iter().filter_map(|f| f.attribute(attribute)).collect();
        for kind in config.skip_types.iter().filter(|k| !present.contains(k.as_str())) {
            warn!(
                "{}: skip value {kind:?} for attribute {attribute:?} not present in data",
                self.asset
            );
        }
        let is_skipped = |f: &SourceFeature| {
            f.attribute(attribute)
                .is_some_and(|value| config.skip_types.contains(value))
        };
        let skipped = sources
            .iter()
            .filter(|&f| is_skipped(f))
            .map(|f| f.id.clone())
            .collect();
        Ok((sources.filtered(|f| !is_skipped(f)), skipped))
    }

    /// Split out qualifying hedge records, keeping one per hedge source.
    ///
    /// Every record of a qualifying hedge source leaves the working set; the
    /// hedge keeps its record with the highest `overlap_source`, ties going to
    /// the smaller target id.
    #[must_use]
    pub fn hedge_prefilter(
        &self,
        records: Vec<OverlapRecord>,
        sources: &HashMap<&str, &SourceFeature>,
        targets: &HashMap<&str, &TargetFeature>,
    ) -> (Vec<OverlapRecord>, Vec<OverlapRecord>) {
        let hedge = &self.config.hedge;
        let qualifies = |r: &OverlapRecord| {
            let kind = sources
                .get(r.source_id.as_str())
                .and_then(|f| f.kind.as_deref());
            let object_type = targets
                .get(r.target_id.as_str())
                .and_then(|f| f.object_type.as_deref());
            kind.is_some_and(|k| hedge.kinds.contains(k))
                && object_type == Some(hedge.target_object_type.as_str())
                && r.overlap_source > hedge.overlap_threshold
        };

        let mut best: BTreeMap<SourceId, OverlapRecord> = BTreeMap::new();
        for record in records.iter().filter(|&r| qualifies(r)) {
            let replace = best.get(&record.source_id).is_none_or(|current| {
                record.overlap_source > current.overlap_source
                    || (record.overlap_source == current.overlap_source
                        && record.target_id < current.target_id)
            });
            if replace {
                best.insert(record.source_id.clone(), record.clone());
            }
        }
        let rest = records
            .into_iter()
            .filter(|r| !best.contains_key(&r.source_id))
            .collect();
        (best.into_values().collect(), rest)
    }

    /// Classify every source feature into exactly one bucket.
    ///
    /// # Errors
    /// Returns [`ReconcileError::Precondition`] for invalid input and
    /// [`ReconcileError::Integrity`] when a rule or the final partition check
    /// detects inconsistent state.
    pub fn classify(
        &self,
        sources: &FeatureCollection<SourceFeature>,
        targets: &FeatureCollection<TargetFeature>,
    ) -> Result<Classification, ReconcileError> {
        let asset = self.asset;
        let config = &self.config;
        let (working, skipped) = self
            .apply_skip_filter(sources)
            .map_err(|e| self.precondition(e))?;
        if !skipped.is_empty() {
            info!("{asset}: skipped {} source features by type", skipped.len());
        }

        let overlaps =
            compute_overlaps(&working, targets, config).map_err(|e| self.precondition(e))?;
        info!("{asset}: {} intersecting pairs", overlaps.len());
        let filtered = filter_overlap_min_ratio(overlaps, config);
        info!("{asset}: {} pairs after ratio filter", filtered.len());

        let source_index: HashMap<&str, &SourceFeature> =
            working.iter().map(|f| (f.id.as_str(), f)).collect();
        let target_index: HashMap<&str, &TargetFeature> =
            targets.iter().map(|f| (f.id.as_str(), f)).collect();

        let (hedges, filtered) = if self.profile.hedge_prefilter {
            let (hedges, rest) = self.hedge_prefilter(filtered, &source_index, &target_index);
            info!("{asset}: {} hedges accepted by pre-filter", hedges.len());
            (Some(annotate_match_flags(add_intersection_counts(hedges), config)), rest)
        } else {
            (None, filtered)
        };

        let records = annotate_match_flags(add_intersection_counts(filtered), config);
        info!("{asset}: {} candidate records", records.len());

        let matched: BTreeSet<&str> = records
            .iter()
            .chain(hedges.iter().flatten())
            .map(|r| r.source_id.as_str())
            .collect();
        let no_matches: Vec<SourceId> = working
            .iter()
            .filter(|f| !matched.contains(f.id.as_str()))
            .map(|f| f.id.clone())
            .collect();
        info!("{asset}: {}: {}", Bucket::NoMatches, no_matches.len());

        let ctx = StageContext {
            records: &records,
            sources: &source_index,
            config,
        };
        let mut claimed: BTreeMap<Bucket, Vec<usize>> = BTreeMap::new();
        let mut remaining: Vec<usize> = (0..records.len()).collect();
        for rule in self.profile.rules() {
            let outcome = rule
                .apply(&ctx, &remaining)
                .map_err(|e| self.integrity(e))?;
            remaining = outcome.remaining;
            if !outcome.dropped.is_empty() {
                info!(
                    "{asset}: {rule:?} dropped {} records of already claimed sources",
                    outcome.dropped.len()
                );
            }
            let unclaimed = source_ids(&ctx, &remaining).len();
            for (bucket, indices) in outcome.claimed {
                info!(
                    "{asset}: {bucket}: {}, remaining: {unclaimed}",
                    source_ids(&ctx, &indices).len()
                );
                claimed.entry(bucket).or_default().extend(indices);
            }
        }
        info!(
            "{asset}: {}: {}",
            Bucket::Remaining,
            source_ids(&ctx, &remaining).len()
        );
        claimed.insert(Bucket::Remaining, remaining);

        let collect = |indices: &[usize]| -> Vec<OverlapRecord> {
            indices
                .iter()
                .filter_map(|&index| records.get(index).cloned())
                .collect()
        };
        let mut buckets: BTreeMap<Bucket, Vec<OverlapRecord>> = claimed
            .iter()
            .map(|(bucket, indices)| (*bucket, collect(indices)))
            .collect();
        if let Some(hedges) = hedges {
            buckets.insert(Bucket::HedgeMatch, hedges);
        }

        let classification = Classification {
            asset,
            no_matches,
            skipped,
            buckets,
            kinds: working
                .iter()
                .map(|f| (f.id.clone(), f.kind.clone()))
                .collect(),
        };
        let expected: Vec<SourceId> = working.iter().map(|f| f.id.clone()).collect();
        classification
            .check_partition(&expected)
            .map_err(|e| self.integrity(e))?;
        Ok(classification)
    }
}
