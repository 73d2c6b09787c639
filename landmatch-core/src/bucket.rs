//! Named classification outcomes.

use std::fmt;

/// A mutually exclusive classification outcome for a source feature.
///
/// Variants are declared in evaluation order, so the derived `Ord` sorts
/// buckets the way the waterfall fills them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Bucket {
    /// The source feature has no surviving overlap with any target.
    NoMatches,
    /// Hedges accepted by the green-object pre-filter.
    HedgeMatch,
    /// Strict one-to-one pairing with both ratios above the geometric threshold.
    #[cfg_attr(feature = "serde", serde(rename = "geom_1_to_1"))]
    Geom1To1,
    /// Several sources jointly cover one target and share attributes; merge them.
    GisibMerge,
    /// Several sources jointly cover one target but differ; split the target.
    BgtSplit,
    /// One source covers several targets; split the source.
    GisibSplit,
    /// Both ratios above the geometric threshold after cardinality stages.
    #[cfg_attr(feature = "serde", serde(rename = "geom_75_match"))]
    Geom75Match,
    /// Combined ratio above 150%; pavement objects only.
    #[cfg_attr(feature = "serde", serde(rename = "geom_overlap_150_match"))]
    GeomOverlap150Match,
    /// A small source clipped inside a larger target.
    ClipMatch,
    /// Everything left over; requires manual review.
    Remaining,
}

impl Bucket {
    /// Every bucket in evaluation order.
    pub const ALL: [Self; 10] = [
        Self::NoMatches,
        Self::HedgeMatch,
        Self::Geom1To1,
        Self::GisibMerge,
        Self::BgtSplit,
        Self::GisibSplit,
        Self::Geom75Match,
        Self::GeomOverlap150Match,
        Self::ClipMatch,
        Self::Remaining,
    ];

    /// Stable bucket name used in logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoMatches => "no_matches",
            Self::HedgeMatch => "hedge_match",
            Self::Geom1To1 => "geom_1_to_1",
            Self::GisibMerge => "gisib_merge",
            Self::BgtSplit => "bgt_split",
            Self::GisibSplit => "gisib_split",
            Self::Geom75Match => "geom_75_match",
            Self::GeomOverlap150Match => "geom_overlap_150_match",
            Self::ClipMatch => "clip_match",
            Self::Remaining => "remaining",
        }
    }

    /// Whether the bucket is resolved without human review.
    #[must_use]
    pub const fn is_automatic(self) -> bool {
        matches!(
            self,
            Self::HedgeMatch
                | Self::Geom1To1
                | Self::GisibMerge
                | Self::GisibSplit
                | Self::Geom75Match
                | Self::GeomOverlap150Match
        )
    }

    /// Look up a bucket by its stable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.name() == name)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn names_round_trip() {
        for bucket in Bucket::ALL {
            assert_eq!(Bucket::from_name(bucket.name()), Some(bucket));
        }
    }

    #[rstest]
    #[case(Bucket::Geom1To1, true)]
    #[case(Bucket::GisibSplit, true)]
    #[case(Bucket::BgtSplit, false)]
    #[case(Bucket::ClipMatch, false)]
    #[case(Bucket::Remaining, false)]
    fn automatic_buckets(#[case] bucket: Bucket, #[case] expected: bool) {
        assert_eq!(bucket.is_automatic(), expected);
    }

    #[rstest]
    fn ordering_follows_evaluation_order() {
        let mut shuffled = vec![Bucket::Remaining, Bucket::Geom1To1, Bucket::NoMatches];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Bucket::NoMatches, Bucket::Geom1To1, Bucket::Remaining]
        );
    }
}
