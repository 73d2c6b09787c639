//! Polygon builders shared by the integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset of the builders")]

use geo::{Coord, MultiPolygon, Rect};
use landmatch_core::{Crs, FeatureCollection};

/// Reference system used throughout the tests (Amersfoort / RD New).
pub const RD_NEW: Crs = Crs::epsg(28992);

/// Axis-aligned rectangle as a multipolygon.
pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
    Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
        .to_polygon()
        .into()
}

/// Square with its lower-left corner at `(x, y)`.
pub fn square(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
    rect(x, y, x + side, y + side)
}

/// Wrap features in a collection using [`RD_NEW`].
pub fn collection<F>(features: Vec<F>) -> FeatureCollection<F> {
    FeatureCollection::new(RD_NEW, features)
}
