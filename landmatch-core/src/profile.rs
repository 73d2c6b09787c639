//! Per-asset customisation of the classification waterfall.
//!
//! Every asset type starts from [`AssetProfile::BASE_RULES`]. A profile adds
//! rules by anchoring them to an existing rule, and may enable the hedge
//! pre-filter for vegetation.

use log::warn;

use crate::bucket::Bucket;
use crate::model::AssetType;

/// One stage of the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Strict 1:1 pairs with both ratios above the geometric threshold.
    OneToOne,
    /// One target covered by several sources (merge or split target).
    TargetGroups,
    /// One source covering several targets.
    SourceGroups,
    /// Both ratios above the geometric threshold.
    GeomMatch,
    /// Ratio sum above the combined-overlap threshold.
    CombinedOverlap,
    /// Small sources clipped inside larger targets.
    Clip,
}

impl Rule {
    /// Buckets this rule can fill, in the order it fills them.
    #[must_use]
    pub const fn buckets(self) -> &'static [Bucket] {
        match self {
            Self::OneToOne => &[Bucket::Geom1To1],
            Self::TargetGroups => &[Bucket::GisibMerge, Bucket::BgtSplit],
            Self::SourceGroups => &[Bucket::GisibSplit],
            Self::GeomMatch => &[Bucket::Geom75Match],
            Self::CombinedOverlap => &[Bucket::GeomOverlap150Match],
            Self::Clip => &[Bucket::ClipMatch],
        }
    }
}

/// Placement of an extra rule relative to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirective {
    /// Run `rule` immediately after `anchor`.
    InsertAfter {
        /// Existing rule to anchor on.
        anchor: Rule,
        /// Rule to insert.
        rule: Rule,
    },
    /// Run `rule` immediately before `anchor`.
    InsertBefore {
        /// Existing rule to anchor on.
        anchor: Rule,
        /// Rule to insert.
        rule: Rule,
    },
}

/// Waterfall customisation for one asset type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetProfile {
    /// Route qualifying hedges into `hedge_match` before counting.
    pub hedge_prefilter: bool,
    /// Extra rules applied to the base list in order.
    pub directives: Vec<RuleDirective>,
}

impl AssetProfile {
    /// Rules shared by every asset type.
    pub const BASE_RULES: [Rule; 5] = [
        Rule::OneToOne,
        Rule::TargetGroups,
        Rule::SourceGroups,
        Rule::GeomMatch,
        Rule::Clip,
    ];

    /// Profile used for `asset`.
    #[must_use]
    pub fn for_asset(asset: AssetType) -> Self {
        match asset {
            AssetType::Terrain => Self::default(),
            AssetType::Green => Self {
                hedge_prefilter: true,
                directives: Vec::new(),
            },
            AssetType::Pavement => Self {
                hedge_prefilter: false,
                directives: vec![RuleDirective::InsertAfter {
                    anchor: Rule::GeomMatch,
                    rule: Rule::CombinedOverlap,
                }],
            },
        }
    }

    /// Resolve the ordered rule list.
    ///
    /// A directive whose anchor is absent appends its rule and logs a
    /// warning.
    ///
    /// # Examples
    /// ```
    /// use landmatch_core::{AssetProfile, AssetType, Rule};
    ///
    /// let rules = AssetProfile::for_asset(AssetType::Pavement).rules();
    /// assert_eq!(rules[3..], [Rule::GeomMatch, Rule::CombinedOverlap, Rule::Clip]);
    /// ```
    #[must_use]
    pub fn rules(&self) -> Vec<Rule> {
        let mut rules = Self::BASE_RULES.to_vec();
        for directive in &self.directives {
            let (anchor, rule, offset) = match *directive {
                RuleDirective::InsertAfter { anchor, rule } => (anchor, rule, 1),
                RuleDirective::InsertBefore { anchor, rule } => (anchor, rule, 0),
            };
            match rules.iter().position(|existing| *existing == anchor) {
                Some(position) => rules.insert(position + offset, rule),
                None => {
                    warn!("anchor rule {anchor:?} not present; appending {rule:?}");
                    rules.push(rule);
                }
            }
        }
        rules
    }

    /// Every bucket the resolved profile can produce, in evaluation order.
    #[must_use]
    pub fn buckets(&self) -> Vec<Bucket> {
        let mut buckets = vec![Bucket::NoMatches];
        if self.hedge_prefilter {
            buckets.push(Bucket::HedgeMatch);
        }
        buckets.extend(self.rules().into_iter().flat_map(|rule| rule.buckets().iter().copied()));
        buckets.push(Bucket::Remaining);
        buckets
    }
}
