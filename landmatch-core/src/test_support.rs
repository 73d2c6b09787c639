//! Builders and deterministic collaborators for tests and benchmarks.

use std::sync::atomic::{AtomicU64, Ordering};

use geo::{Coord, MultiPolygon, Rect};
use uuid::Uuid;

use crate::ids::{IdGenerator, brace_uuid};
use crate::model::SourceId;
use crate::overlap::OverlapRecord;

/// Axis-aligned rectangle as a multipolygon.
#[must_use]
pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
    Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
        .to_polygon()
        .into()
}

/// Square with its lower-left corner at `(x, y)`.
#[must_use]
pub fn square(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
    rect(x, y, x + side, y + side)
}

/// Overlap record with unit areas, equal elevations and zeroed counts.
#[must_use]
pub fn record(source: &str, target: &str, overlap_target: f64, overlap_source: f64) -> OverlapRecord {
    OverlapRecord {
        source_id: source.into(),
        target_id: target.into(),
        intersection: MultiPolygon::new(Vec::new()),
        intersection_area: overlap_source,
        source_area: 1.0,
        target_area: 1.0,
        source_elevation: None,
        target_elevation: None,
        overlap_target,
        overlap_source,
        geometry_equal: false,
        perfect_match: false,
        elevation_match: true,
        targets_per_source: 0,
        sources_per_target: 0,
    }
}

/// Identifier source counting upwards from one.
///
/// Produces `{00000000-0000-0000-0000-000000000001}`, then `...0002`, and so
/// on, so expected identifiers can be written into assertions.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start a fresh sequence.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> SourceId {
        let value = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        brace_uuid(Uuid::from_u128(u128::from(value)))
    }
}

/// Identifier source that always returns the same value.
#[derive(Debug, Clone)]
pub struct FixedIdGenerator(pub SourceId);

impl IdGenerator for FixedIdGenerator {
    fn generate(&self) -> SourceId {
        self.0.clone()
    }
}
