//! Relationship cardinality between sources and targets.

use std::collections::{BTreeMap, BTreeSet};

use crate::overlap::OverlapRecord;

/// Annotate each record with its distinct-counterpart counts.
///
/// `targets_per_source` counts the distinct target ids sharing the record's
/// source id, and `sources_per_target` the distinct source ids sharing its
/// target id. Both include the record's own counterpart, so a strict 1:1
/// pairing carries `1` on both sides. The counts depend only on the set of
/// records, never on their order.
///
/// # Examples
/// ```
/// use geo::MultiPolygon;
/// use landmatch_core::{add_intersection_counts, OverlapRecord};
///
/// let record = |s: &str, t: &str| OverlapRecord {
///     source_id: s.into(),
///     target_id: t.into(),
///     intersection: MultiPolygon::new(Vec::new()),
///     intersection_area: 1.0,
///     source_area: 2.0,
///     target_area: 2.0,
///     source_elevation: None,
///     target_elevation: None,
///     overlap_target: 0.5,
///     overlap_source: 0.5,
///     geometry_equal: false,
///     perfect_match: false,
///     elevation_match: true,
///     targets_per_source: 0,
///     sources_per_target: 0,
/// };
///
/// let counted = add_intersection_counts(vec![record("S", "T1"), record("S", "T2")]);
/// assert!(counted.iter().all(|r| r.targets_per_source == 2 && r.sources_per_target == 1));
/// ```
#[must_use]
pub fn add_intersection_counts(records: Vec<OverlapRecord>) -> Vec<OverlapRecord> {
    let mut targets_by_source: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut sources_by_target: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in &records {
        targets_by_source
            .entry(record.source_id.as_str())
            .or_default()
            .insert(record.target_id.as_str());
        sources_by_target
            .entry(record.target_id.as_str())
            .or_default()
            .insert(record.source_id.as_str());
    }
    let counts: Vec<(usize, usize)> = records
        .iter()
        .map(|record| {
            (
                targets_by_source
                    .get(record.source_id.as_str())
                    .map_or(0, BTreeSet::len),
                sources_by_target
                    .get(record.target_id.as_str())
                    .map_or(0, BTreeSet::len),
            )
        })
        .collect();

    records
        .into_iter()
        .zip(counts)
        .map(|(mut record, (targets, sources))| {
            record.targets_per_source = targets;
            record.sources_per_target = sources;
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use rstest::rstest;

    fn counts(records: &[OverlapRecord]) -> Vec<(usize, usize)> {
        records
            .iter()
            .map(|r| (r.targets_per_source, r.sources_per_target))
            .collect()
    }

    #[rstest]
    fn one_to_one_counts_are_unity() {
        let counted = add_intersection_counts(vec![record("{A}", "T1", 0.9, 0.9)]);
        assert_eq!(counts(&counted), vec![(1, 1)]);
    }

    #[rstest]
    fn mixed_cardinalities() {
        let counted = add_intersection_counts(vec![
            record("{A}", "T1", 0.5, 0.5),
            record("{A}", "T2", 0.5, 0.5),
            record("{B}", "T2", 0.5, 0.5),
            record("{C}", "T3", 0.5, 0.5),
        ]);
        assert_eq!(counts(&counted), vec![(2, 1), (2, 2), (1, 2), (1, 1)]);
    }

    #[rstest]
    fn counts_ignore_record_order() {
        let forward = add_intersection_counts(vec![
            record("{A}", "T1", 0.5, 0.5),
            record("{B}", "T1", 0.5, 0.5),
        ]);
        let backward = add_intersection_counts(vec![
            record("{B}", "T1", 0.5, 0.5),
            record("{A}", "T1", 0.5, 0.5),
        ]);
        assert_eq!(counts(&forward), counts(&backward));
    }
}
