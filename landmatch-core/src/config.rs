//! Thresholds and switches steering the matching pipeline.
//!
//! A [`MatchConfig`] is handed to the classifier at construction; nothing in
//! the pipeline reads module-level state.

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::model::ATTR_TYPE;

/// How a missing elevation takes part in equality comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ElevationNullPolicy {
    /// Unknown elevation compares as ground level (`0`).
    #[default]
    TreatAsZero,
}

impl ElevationNullPolicy {
    /// Resolve an optional elevation to the value used for comparisons.
    #[must_use]
    pub fn resolve(self, elevation: Option<i32>) -> i32 {
        match self {
            Self::TreatAsZero => elevation.unwrap_or(0),
        }
    }
}

/// What to do when source features overlap each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum InternalOverlapPolicy {
    /// Skip the check.
    Ignore,
    /// Log each overlapping pair and continue.
    #[default]
    Warn,
    /// Fail every asset type involved in an overlapping pair.
    Reject,
}

/// Open interval treated as "approximately one".
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearUnityBand {
    /// Exclusive lower bound.
    pub low: f64,
    /// Exclusive upper bound.
    pub high: f64,
}

impl NearUnityBand {
    /// Whether `value` lies strictly inside the band.
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value > self.low && value < self.high
    }
}

impl Default for NearUnityBand {
    fn default() -> Self {
        Self {
            low: 0.90,
            high: 1.10,
        }
    }
}

/// Settings for the hedge pre-filter applied to green objects.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct HedgeFilterConfig {
    /// Source `type` values identifying hedges.
    pub kinds: BTreeSet<String>,
    /// Target object type hedges must overlap.
    pub target_object_type: String,
    /// Minimum `overlap_source` (exclusive) for acceptance.
    pub overlap_threshold: f64,
}

impl Default for HedgeFilterConfig {
    fn default() -> Self {
        Self {
            kinds: BTreeSet::from(["Haag".to_owned()]),
            target_object_type: "Vegetatieobject".to_owned(),
            overlap_threshold: 0.90,
        }
    }
}

/// Thresholds used by the overlap engine, classifier and validators.
///
/// # Examples
/// ```
/// use landmatch_core::MatchConfig;
///
/// let config = MatchConfig::default();
/// assert!(config.validate().is_ok());
/// assert!(config.skip_types.contains("Rietland"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MatchConfig {
    /// Source categories excluded before overlap computation.
    pub skip_types: BTreeSet<String>,
    /// Attribute holding the skip category.
    pub skip_attribute: String,
    /// At least one ratio must reach this value for a pair to survive.
    pub min_overlap_ratio: f64,
    /// The two ratios must sum to more than this value for a pair to survive.
    pub min_combined_overlap: f64,
    /// Both ratios above this value flag a perfect match.
    pub perfect_match_threshold: f64,
    /// Both ratios above this value qualify for the geometric buckets.
    pub geom_match_threshold: f64,
    /// Band used by the cardinality grouping stages.
    pub near_unity_band: NearUnityBand,
    /// Clip matches require `overlap_target` below this value.
    pub clip_target_max: f64,
    /// Clip matches require `overlap_source` above this value.
    pub clip_overlap_threshold: f64,
    /// Combined-overlap stage requires the ratio sum above this value.
    pub combined_overlap_threshold: f64,
    /// Hedge pre-filter settings.
    pub hedge: HedgeFilterConfig,
    /// Coordinate tolerance for exact boundary equality.
    pub equality_tolerance: f64,
    /// How null elevations compare.
    pub elevation_null_policy: ElevationNullPolicy,
    /// Share of either feature's area above which source features overlap.
    pub internal_overlap_threshold: f64,
    /// Reaction to internally overlapping source features.
    pub internal_overlap_policy: InternalOverlapPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            skip_types: BTreeSet::from(["Rietland".to_owned(), "Moeras".to_owned()]),
            skip_attribute: ATTR_TYPE.to_owned(),
            min_overlap_ratio: 0.10,
            min_combined_overlap: 0.60,
            perfect_match_threshold: 0.90,
            geom_match_threshold: 0.75,
            near_unity_band: NearUnityBand::default(),
            clip_target_max: 0.50,
            clip_overlap_threshold: 0.85,
            combined_overlap_threshold: 1.5,
            hedge: HedgeFilterConfig::default(),
            equality_tolerance: 0.001,
            elevation_null_policy: ElevationNullPolicy::default(),
            internal_overlap_threshold: 0.5,
            internal_overlap_policy: InternalOverlapPolicy::default(),
        }
    }
}

impl MatchConfig {
    /// Check every threshold is finite and within its meaningful range.
    ///
    /// # Errors
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("min_overlap_ratio", self.min_overlap_ratio),
            ("perfect_match_threshold", self.perfect_match_threshold),
            ("geom_match_threshold", self.geom_match_threshold),
            ("clip_target_max", self.clip_target_max),
            ("clip_overlap_threshold", self.clip_overlap_threshold),
            ("hedge.overlap_threshold", self.hedge.overlap_threshold),
            ("internal_overlap_threshold", self.internal_overlap_threshold),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError {
                    field,
                    reason: format!("{value} is outside 0.0..=1.0"),
                });
            }
        }
        let sums = [
            ("min_combined_overlap", self.min_combined_overlap),
            ("combined_overlap_threshold", self.combined_overlap_threshold),
        ];
        for (field, value) in sums {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError {
                    field,
                    reason: format!("{value} is outside 0.0..=2.0"),
                });
            }
        }
        let band = self.near_unity_band;
        if !(band.low.is_finite() && band.high.is_finite() && band.low < band.high) {
            return Err(ConfigError {
                field: "near_unity_band",
                reason: format!("({}, {}) is not a finite open interval", band.low, band.high),
            });
        }
        if !(self.equality_tolerance.is_finite() && self.equality_tolerance >= 0.0) {
            return Err(ConfigError {
                field: "equality_tolerance",
                reason: format!("{} must be finite and non-negative", self.equality_tolerance),
            });
        }
        if self.skip_attribute.is_empty() {
            return Err(ConfigError {
                field: "skip_attribute",
                reason: "attribute name must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// Resolve an optional elevation under the configured null policy.
    #[must_use]
    pub fn elevation(&self, elevation: Option<i32>) -> i32 {
        self.elevation_null_policy.resolve(elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.90, false)]
    #[case(0.95, true)]
    #[case(1.0, true)]
    #[case(1.10, false)]
    fn near_unity_band_is_open(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(NearUnityBand::default().contains(value), expected);
    }

    #[rstest]
    fn null_elevation_is_ground_level() {
        let config = MatchConfig::default();
        assert_eq!(config.elevation(None), 0);
        assert_eq!(config.elevation(Some(-1)), -1);
    }

    #[rstest]
    fn rejects_ratio_out_of_range() {
        let config = MatchConfig {
            geom_match_threshold: 1.5,
            ..MatchConfig::default()
        };
        let err = config.validate().expect_err("1.5 is not a ratio");
        assert_eq!(err.field, "geom_match_threshold");
    }

    #[rstest]
    fn rejects_inverted_band() {
        let config = MatchConfig {
            near_unity_band: NearUnityBand {
                low: 1.1,
                high: 0.9,
            },
            ..MatchConfig::default()
        };
        let err = config.validate().expect_err("inverted band");
        assert_eq!(err.field, "near_unity_band");
    }

    #[rstest]
    fn rejects_nan_threshold() {
        let config = MatchConfig {
            min_overlap_ratio: f64::NAN,
            ..MatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
