//! Feature model shared by every stage of the matching pipeline.
//!
//! Source features come from the asset-management inventory and target
//! features from the authoritative topographic inventory. Both are immutable
//! for the duration of a run; the pipeline only ever reads them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::MultiPolygon;
use thiserror::Error;

macro_rules! feature_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(transparent)
        )]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper, returning the identifier text.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

feature_id!(
    /// Identifier of a [`SourceFeature`], unique within one asset type.
    SourceId
);

feature_id!(
    /// Identifier of a [`TargetFeature`], unique across the target inventory.
    TargetId
);

/// Coordinate reference system, identified by its EPSG code.
///
/// # Examples
/// ```
/// use landmatch_core::Crs;
///
/// assert_eq!(Crs::epsg(28992).to_string(), "EPSG:28992");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Crs(u32);

impl Crs {
    /// Construct a reference system from its EPSG code.
    #[must_use]
    pub const fn epsg(code: u32) -> Self {
        Self(code)
    }

    /// Return the EPSG code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// The closed set of asset inventories reconciled against the target data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum AssetType {
    /// Terrain parcels.
    Terrain,
    /// Green objects; hedges receive a dedicated pre-filter.
    Green,
    /// Pavement objects; adds the combined-overlap stage.
    Pavement,
}

impl AssetType {
    /// Every asset type in processing order.
    pub const ALL: [Self; 3] = [Self::Terrain, Self::Green, Self::Pavement];

    /// Stable lowercase name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terrain => "terrain",
            Self::Green => "green",
            Self::Pavement => "pavement",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown asset type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown asset type {0:?}; expected one of terrain, green, pavement")]
pub struct UnknownAssetType(pub String);

impl FromStr for AssetType {
    type Err = UnknownAssetType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|asset| asset.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownAssetType(value.to_owned()))
    }
}

/// Attribute name resolving to [`SourceFeature::kind`].
pub const ATTR_TYPE: &str = "type";
/// Attribute name resolving to [`SourceFeature::detailed_kind`].
pub const ATTR_DETAILED_TYPE: &str = "detailed_type";
/// Attribute name resolving to [`SourceFeature::maintainer`].
pub const ATTR_MAINTAINER: &str = "maintainer";
/// Attribute name resolving to [`SourceFeature::detailed_maintainer`].
pub const ATTR_DETAILED_MAINTAINER: &str = "detailed_maintainer";

/// A polygon from the asset-management inventory.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use landmatch_core::SourceFeature;
///
/// let parcel = SourceFeature::new(
///     "{A}",
///     Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }).to_polygon(),
/// )
/// .with_kind("Gras")
/// .with_elevation(0);
/// assert_eq!(parcel.attribute("type"), Some("Gras"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceFeature {
    /// Unique identifier within the asset type.
    pub id: SourceId,
    /// Polygonal footprint.
    pub geometry: MultiPolygon<f64>,
    /// Relative elevation; `None` when unknown.
    #[cfg_attr(feature = "serde", serde(default))]
    pub elevation: Option<i32>,
    /// Object type, also used for skip classification.
    #[cfg_attr(feature = "serde", serde(default, rename = "type"))]
    pub kind: Option<String>,
    /// Detailed object type.
    #[cfg_attr(feature = "serde", serde(default, rename = "detailed_type"))]
    pub detailed_kind: Option<String>,
    /// Party responsible for maintenance.
    #[cfg_attr(feature = "serde", serde(default))]
    pub maintainer: Option<String>,
    /// Detailed maintainer classification.
    #[cfg_attr(feature = "serde", serde(default))]
    pub detailed_maintainer: Option<String>,
    /// Remaining categorical attributes, carried through to new features.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: BTreeMap<String, String>,
}

impl SourceFeature {
    /// Construct a feature with no optional attributes.
    pub fn new(id: impl Into<SourceId>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
            elevation: None,
            kind: None,
            detailed_kind: None,
            maintainer: None,
            detailed_maintainer: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the relative elevation.
    #[must_use]
    pub const fn with_elevation(mut self, elevation: i32) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Set the object type.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the detailed object type.
    #[must_use]
    pub fn with_detailed_kind(mut self, kind: impl Into<String>) -> Self {
        self.detailed_kind = Some(kind.into());
        self
    }

    /// Set the maintainer.
    #[must_use]
    pub fn with_maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.maintainer = Some(maintainer.into());
        self
    }

    /// Set the detailed maintainer.
    #[must_use]
    pub fn with_detailed_maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.detailed_maintainer = Some(maintainer.into());
        self
    }

    /// Add a free-form categorical attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute by name.
    ///
    /// The well-known names (`type`, `detailed_type`, `maintainer`,
    /// `detailed_maintainer`) resolve to the typed fields; anything else is
    /// read from [`SourceFeature::attributes`].
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            ATTR_TYPE => self.kind.as_deref(),
            ATTR_DETAILED_TYPE => self.detailed_kind.as_deref(),
            ATTR_MAINTAINER => self.maintainer.as_deref(),
            ATTR_DETAILED_MAINTAINER => self.detailed_maintainer.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        }
    }

    /// Whether `name` is a typed attribute or present in the free-form map.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        matches!(
            name,
            ATTR_TYPE | ATTR_DETAILED_TYPE | ATTR_MAINTAINER | ATTR_DETAILED_MAINTAINER
        ) || self.attributes.contains_key(name)
    }
}

/// A polygon from the authoritative topographic inventory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetFeature {
    /// Unique identifier.
    pub id: TargetId,
    /// Polygonal footprint.
    pub geometry: MultiPolygon<f64>,
    /// Elevation level; `None` when unknown.
    #[cfg_attr(feature = "serde", serde(default))]
    pub elevation: Option<i32>,
    /// Object type tag used for upstream filtering.
    #[cfg_attr(feature = "serde", serde(default))]
    pub object_type: Option<String>,
}

impl TargetFeature {
    /// Construct a target feature with no elevation or object type.
    pub fn new(id: impl Into<TargetId>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
            elevation: None,
            object_type: None,
        }
    }

    /// Set the elevation level.
    #[must_use]
    pub const fn with_elevation(mut self, elevation: i32) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Set the object type tag.
    #[must_use]
    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }
}

/// Features sharing one coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureCollection<F> {
    /// Reference system of every geometry; `None` when unset.
    #[cfg_attr(feature = "serde", serde(default))]
    pub crs: Option<Crs>,
    /// Member features.
    pub features: Vec<F>,
}

impl<F> FeatureCollection<F> {
    /// Construct a collection in the given reference system.
    #[must_use]
    pub const fn new(crs: Crs, features: Vec<F>) -> Self {
        Self {
            crs: Some(crs),
            features,
        }
    }

    /// Construct a collection without a reference system.
    #[must_use]
    pub const fn without_crs(features: Vec<F>) -> Self {
        Self {
            crs: None,
            features,
        }
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate over the features.
    pub fn iter(&self) -> std::slice::Iter<'_, F> {
        self.features.iter()
    }
}

impl<F: Clone> FeatureCollection<F> {
    /// Clone the features accepted by `keep` into a new collection.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&F) -> bool) -> Self {
        Self {
            crs: self.crs,
            features: self.features.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Rect};
    use rstest::rstest;

    fn unit_square() -> MultiPolygon<f64> {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 })
            .to_polygon()
            .into()
    }

    #[rstest]
    #[case("terrain", AssetType::Terrain)]
    #[case("GREEN", AssetType::Green)]
    #[case("Pavement", AssetType::Pavement)]
    fn asset_type_parses_case_insensitively(#[case] raw: &str, #[case] expected: AssetType) {
        assert_eq!(raw.parse::<AssetType>(), Ok(expected));
    }

    #[rstest]
    fn asset_type_rejects_unknown_names() {
        let err = "water".parse::<AssetType>().expect_err("unknown asset");
        assert_eq!(err, UnknownAssetType("water".into()));
    }

    #[rstest]
    #[case(ATTR_TYPE, Some("Haag"))]
    #[case(ATTR_MAINTAINER, Some("Stadsdeel"))]
    #[case("neighbourhood", Some("Centrum"))]
    #[case(ATTR_DETAILED_TYPE, None)]
    #[case("unknown", None)]
    fn attribute_lookup_covers_typed_and_free_form(
        #[case] name: &str,
        #[case] expected: Option<&str>,
    ) {
        let feature = SourceFeature::new("{A}", unit_square())
            .with_kind("Haag")
            .with_maintainer("Stadsdeel")
            .with_attribute("neighbourhood", "Centrum");
        assert_eq!(feature.attribute(name), expected);
    }

    #[rstest]
    fn typed_attributes_always_exist() {
        let feature = SourceFeature::new("{A}", unit_square());
        assert!(feature.has_attribute(ATTR_DETAILED_MAINTAINER));
        assert!(!feature.has_attribute("neighbourhood"));
    }

    #[rstest]
    fn filtered_keeps_crs_and_matching_features() {
        let collection = FeatureCollection::new(
            Crs::epsg(28992),
            vec![
                SourceFeature::new("{A}", unit_square()).with_kind("Gras"),
                SourceFeature::new("{B}", unit_square()).with_kind("Rietland"),
            ],
        );
        let kept = collection.filtered(|f| f.kind.as_deref() != Some("Rietland"));
        assert_eq!(kept.crs, Some(Crs::epsg(28992)));
        assert_eq!(kept.len(), 1);
    }
}
