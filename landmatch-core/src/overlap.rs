//! Pairwise overlap computation between source and target polygons.
//!
//! Candidate pairs are found through an R\*-tree over target bounding boxes;
//! only pairs whose intersection has positive area become [`OverlapRecord`]s.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use geo::{Area, BooleanOps, BoundingRect, LineString, MultiPolygon, Polygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

use crate::config::MatchConfig;
use crate::error::{PreconditionError, Side};
use crate::model::{Crs, FeatureCollection, SourceFeature, SourceId, TargetFeature, TargetId};

/// Intersection of one source and one target feature.
///
/// Ratios are clamped to `1.0`, so `0 < overlap_source <= 1` and
/// `0 < overlap_target <= 1` always hold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlapRecord {
    /// Intersecting source feature.
    pub source_id: SourceId,
    /// Intersecting target feature.
    pub target_id: TargetId,
    /// Shared area as a polygon set.
    pub intersection: MultiPolygon<f64>,
    /// Area of [`OverlapRecord::intersection`].
    pub intersection_area: f64,
    /// Full area of the source feature.
    pub source_area: f64,
    /// Full area of the target feature.
    pub target_area: f64,
    /// Source relative elevation as supplied.
    pub source_elevation: Option<i32>,
    /// Target elevation as supplied.
    pub target_elevation: Option<i32>,
    /// Intersection area divided by target area.
    pub overlap_target: f64,
    /// Intersection area divided by source area.
    pub overlap_source: f64,
    /// Source and target boundaries match within the equality tolerance.
    pub geometry_equal: bool,
    /// Both ratios exceed the perfect-match threshold.
    pub perfect_match: bool,
    /// Null-as-zero elevations agree.
    pub elevation_match: bool,
    /// Distinct targets sharing this record's source.
    pub targets_per_source: usize,
    /// Distinct sources sharing this record's target.
    pub sources_per_target: usize,
}

impl OverlapRecord {
    /// Sum of both overlap ratios.
    #[must_use]
    pub fn combined_overlap(&self) -> f64 {
        self.overlap_source + self.overlap_target
    }
}

type TargetEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn ensure_shared_crs(source: Option<Crs>, target: Option<Crs>) -> Result<(), PreconditionError> {
    let source_crs = source.ok_or(PreconditionError::MissingCrs { side: Side::Source })?;
    let target_crs = target.ok_or(PreconditionError::MissingCrs { side: Side::Target })?;
    if source_crs == target_crs {
        Ok(())
    } else {
        Err(PreconditionError::CrsMismatch {
            source_crs,
            target_crs,
        })
    }
}

/// Validate identifiers and measure every geometry, in input order.
fn measure<'a, I>(side: Side, features: I) -> Result<Vec<f64>, PreconditionError>
where
    I: IntoIterator<Item = (&'a str, &'a MultiPolygon<f64>)>,
{
    let mut seen = HashSet::new();
    let mut areas = Vec::new();
    for (position, (id, geometry)) in features.into_iter().enumerate() {
        if id.is_empty() {
            return Err(PreconditionError::EmptyIdentifier { side, position });
        }
        if !seen.insert(id) {
            return Err(PreconditionError::DuplicateIdentifier {
                side,
                id: id.to_owned(),
            });
        }
        let area = geometry.unsigned_area();
        if !(area.is_finite() && area > 0.0) {
            return Err(PreconditionError::ZeroArea {
                side,
                id: id.to_owned(),
            });
        }
        areas.push(area);
    }
    Ok(areas)
}

fn build_target_index(targets: &[TargetFeature]) -> RTree<TargetEnvelope> {
    let envelopes = targets
        .iter()
        .enumerate()
        .filter_map(|(index, target)| {
            target.geometry.bounding_rect().map(|rect| {
                let rectangle = Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                GeomWithData::new(rectangle, index)
            })
        })
        .collect();
    RTree::bulk_load(envelopes)
}

/// Compute every source/target intersection with positive area.
///
/// Records are emitted in source order, then target order, so the output is
/// a pure function of the input ordering.
///
/// # Errors
/// Returns [`PreconditionError`] when either collection lacks a reference
/// system, the reference systems differ, an identifier is empty or repeated,
/// or a geometry has zero area.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use landmatch_core::{compute_overlaps, Crs, FeatureCollection, MatchConfig, SourceFeature, TargetFeature};
///
/// let square = |x: f64| Rect::new(Coord { x, y: 0.0 }, Coord { x: x + 10.0, y: 10.0 }).to_polygon();
/// let sources = FeatureCollection::new(Crs::epsg(28992), vec![SourceFeature::new("{S}", square(0.0))]);
/// let targets = FeatureCollection::new(Crs::epsg(28992), vec![TargetFeature::new("T", square(5.0))]);
///
/// let records = compute_overlaps(&sources, &targets, &MatchConfig::default())?;
/// assert_eq!(records.len(), 1);
/// assert!((records[0].overlap_source - 0.5).abs() < 1e-9);
/// # Ok::<(), landmatch_core::PreconditionError>(())
/// ```
pub fn compute_overlaps(
    sources: &FeatureCollection<SourceFeature>,
    targets: &FeatureCollection<TargetFeature>,
    config: &MatchConfig,
) -> Result<Vec<OverlapRecord>, PreconditionError> {
    ensure_shared_crs(sources.crs, targets.crs)?;
    let source_areas = measure(
        Side::Source,
        sources.iter().map(|f| (f.id.as_str(), &f.geometry)),
    )?;
    let target_areas = measure(
        Side::Target,
        targets.iter().map(|f| (f.id.as_str(), &f.geometry)),
    )?;
    let index = build_target_index(&targets.features);

    let mut records = Vec::new();
    for (source, source_area) in sources.iter().zip(source_areas) {
        let Some(bounds) = source.geometry.bounding_rect() else {
            continue;
        };
        let envelope =
            AABB::from_corners([bounds.min().x, bounds.min().y], [bounds.max().x, bounds.max().y]);
        let mut candidates: Vec<usize> = index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        candidates.sort_unstable();

        for candidate in candidates {
            let (Some(target), Some(&target_area)) =
                (targets.features.get(candidate), target_areas.get(candidate))
            else {
                continue;
            };
            let intersection = source.geometry.intersection(&target.geometry);
            let intersection_area = intersection.unsigned_area();
            if !(intersection_area > 0.0) {
                continue;
            }
            records.push(OverlapRecord {
                source_id: source.id.clone(),
                target_id: target.id.clone(),
                intersection,
                intersection_area,
                source_area,
                target_area,
                source_elevation: source.elevation,
                target_elevation: target.elevation,
                overlap_target: (intersection_area / target_area).min(1.0),
                overlap_source: (intersection_area / source_area).min(1.0),
                geometry_equal: equals_exact(
                    &source.geometry,
                    &target.geometry,
                    config.equality_tolerance,
                ),
                perfect_match: false,
                elevation_match: false,
                targets_per_source: 0,
                sources_per_target: 0,
            });
        }
    }
    Ok(records)
}

/// Vertex-by-vertex equality within `tolerance` distance units.
#[must_use]
pub fn equals_exact(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, tolerance: f64) -> bool {
    a.0.len() == b.0.len()
        && a.0
            .iter()
            .zip(&b.0)
            .all(|(left, right)| polygons_equal(left, right, tolerance))
}

fn polygons_equal(a: &Polygon<f64>, b: &Polygon<f64>, tolerance: f64) -> bool {
    rings_equal(a.exterior(), b.exterior(), tolerance)
        && a.interiors().len() == b.interiors().len()
        && a
            .interiors()
            .iter()
            .zip(b.interiors())
            .all(|(left, right)| rings_equal(left, right, tolerance))
}

fn rings_equal(a: &LineString<f64>, b: &LineString<f64>, tolerance: f64) -> bool {
    a.0.len() == b.0.len()
        && a
            .0
            .iter()
            .zip(&b.0)
            .all(|(p, q)| (p.x - q.x).hypot(p.y - q.y) <= tolerance)
}

/// Drop negligible slivers and jointly insignificant pairs.
///
/// A record survives when at least one ratio reaches
/// [`MatchConfig::min_overlap_ratio`] and the two ratios together exceed
/// [`MatchConfig::min_combined_overlap`].
#[must_use]
pub fn filter_overlap_min_ratio(
    records: Vec<OverlapRecord>,
    config: &MatchConfig,
) -> Vec<OverlapRecord> {
    records
        .into_iter()
        .filter(|record| {
            let either = record.overlap_target >= config.min_overlap_ratio
                || record.overlap_source >= config.min_overlap_ratio;
            either && record.combined_overlap() > config.min_combined_overlap
        })
        .collect()
}

/// Flag perfect and elevation matches, then resolve conflicting candidates.
///
/// See [`resolve_match_conflicts`] for the resolution rules.
#[must_use]
pub fn annotate_match_flags(
    records: Vec<OverlapRecord>,
    config: &MatchConfig,
) -> Vec<OverlapRecord> {
    let flagged = records
        .into_iter()
        .map(|mut record| {
            record.perfect_match = record.overlap_target > config.perfect_match_threshold
                && record.overlap_source > config.perfect_match_threshold;
            record.elevation_match = config.elevation(record.source_elevation)
                == config.elevation(record.target_elevation);
            record
        })
        .collect();
    resolve_match_conflicts(flagged)
}

#[derive(Debug, Default, Clone, Copy)]
struct CandidateFlags {
    elevation_match: bool,
    elevation_mismatch: bool,
    perfect: bool,
}

/// Keep only the decisive records for sources with competing candidates.
///
/// 1. A source with a perfect match at equal elevation keeps only those
///    records.
/// 2. A source whose remaining candidates include both equal and differing
///    elevations, and at least one perfect match, keeps only its perfect
///    matches.
///
/// Record order is preserved.
#[must_use]
pub fn resolve_match_conflicts(records: Vec<OverlapRecord>) -> Vec<OverlapRecord> {
    let decisive: BTreeSet<SourceId> = records
        .iter()
        .filter(|r| r.perfect_match && r.elevation_match)
        .map(|r| r.source_id.clone())
        .collect();
    let narrowed: Vec<OverlapRecord> = records
        .into_iter()
        .filter(|r| !decisive.contains(&r.source_id) || (r.perfect_match && r.elevation_match))
        .collect();

    let mut flags: BTreeMap<&SourceId, CandidateFlags> = BTreeMap::new();
    for record in &narrowed {
        let entry = flags.entry(&record.source_id).or_default();
        entry.elevation_match |= record.elevation_match;
        entry.elevation_mismatch |= !record.elevation_match;
        entry.perfect |= record.perfect_match;
    }
    let split_elevation: BTreeSet<SourceId> = flags
        .into_iter()
        .filter(|(_, f)| f.elevation_match && f.elevation_mismatch && f.perfect)
        .map(|(id, _)| id.clone())
        .collect();

    narrowed
        .into_iter()
        .filter(|r| !split_elevation.contains(&r.source_id) || r.perfect_match)
        .collect()
}
