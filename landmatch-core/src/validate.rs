//! Detection of source features overlapping each other.
//!
//! Overlapping source polygons at the same elevation usually mean a feature
//! was digitised twice, possibly under different asset types. They are found
//! across every asset type of a batch, not within one type only.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

use crate::config::MatchConfig;
use crate::model::{AssetType, FeatureCollection, SourceFeature, SourceId};

/// A source feature identified across asset types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetFeatureRef {
    /// Asset type holding the feature.
    pub asset: AssetType,
    /// Feature identifier within that asset type.
    pub id: SourceId,
}

/// Two source features sharing more than the configured share of area.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InternalOverlap {
    /// Earlier feature in batch order.
    pub first: AssetFeatureRef,
    /// Later feature in batch order.
    pub second: AssetFeatureRef,
    /// Shared area.
    pub intersection_area: f64,
    /// Shared area divided by the first feature's area.
    pub first_ratio: f64,
    /// Shared area divided by the second feature's area.
    pub second_ratio: f64,
}

impl InternalOverlap {
    /// Whether `asset` holds either feature.
    #[must_use]
    pub fn involves(&self, asset: AssetType) -> bool {
        self.first.asset == asset || self.second.asset == asset
    }
}

struct Candidate<'a> {
    asset: AssetType,
    feature: &'a SourceFeature,
    area: f64,
    elevation: i32,
}

fn envelope(geometry: &MultiPolygon<f64>) -> Option<([f64; 2], [f64; 2])> {
    geometry
        .bounding_rect()
        .map(|rect| ([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

/// Find source pairs at equal elevation whose intersection exceeds
/// [`MatchConfig::internal_overlap_threshold`] of either feature's area.
///
/// Features are visited asset by asset in [`AssetType`] order, then in input
/// order; each pair is reported once. Zero-area features are ignored here and
/// rejected later by the overlap engine.
#[must_use]
pub fn find_internal_overlaps(
    assets: &BTreeMap<AssetType, FeatureCollection<SourceFeature>>,
    config: &MatchConfig,
) -> Vec<InternalOverlap> {
    let candidates: Vec<Candidate<'_>> = assets
        .iter()
        .flat_map(|(asset, collection)| {
            collection.iter().map(move |feature| Candidate {
                asset: *asset,
                feature,
                area: feature.geometry.unsigned_area(),
                elevation: config.elevation(feature.elevation),
            })
        })
        .filter(|c| c.area > 0.0)
        .collect();

    let tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
        candidates
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                envelope(&c.feature.geometry)
                    .map(|(min, max)| GeomWithData::new(Rectangle::from_corners(min, max), index))
            })
            .collect(),
    );

    let threshold = config.internal_overlap_threshold;
    let mut overlaps = Vec::new();
    for (index, first) in candidates.iter().enumerate() {
        let Some((min, max)) = envelope(&first.feature.geometry) else {
            continue;
        };
        let mut neighbours: Vec<usize> = tree
            .locate_in_envelope_intersecting(&AABB::from_corners(min, max))
            .map(|entry| entry.data)
            .filter(|&other| other > index)
            .collect();
        neighbours.sort_unstable();

        for other in neighbours {
            let Some(second) = candidates.get(other) else {
                continue;
            };
            if first.elevation != second.elevation {
                continue;
            }
            let shared = first
                .feature
                .geometry
                .intersection(&second.feature.geometry)
                .unsigned_area();
            let first_ratio = shared / first.area;
            let second_ratio = shared / second.area;
            if first_ratio > threshold || second_ratio > threshold {
                overlaps.push(InternalOverlap {
                    first: AssetFeatureRef {
                        asset: first.asset,
                        id: first.feature.id.clone(),
                    },
                    second: AssetFeatureRef {
                        asset: second.asset,
                        id: second.feature.id.clone(),
                    },
                    intersection_area: shared,
                    first_ratio,
                    second_ratio,
                });
            }
        }
    }
    overlaps
}
