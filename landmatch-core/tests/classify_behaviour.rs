//! Behavioural coverage for classification and action derivation.

mod support;

use std::cell::RefCell;

use landmatch_core::{
    AssetReport, AssetType, Bucket, IntegrityError, MatchConfig, ReconcileError,
    ReconciliationAction, SourceFeature, SourceId, TargetFeature, UuidGenerator, is_brace_uuid,
    reconcile_asset,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::{collection, rect, square};

/// Inputs and outcome of one scenario.
#[derive(Debug, Default)]
struct ClassifyWorld {
    sources: RefCell<Vec<SourceFeature>>,
    targets: RefCell<Vec<TargetFeature>>,
    outcome: RefCell<Option<Result<AssetReport, ReconcileError>>>,
}

impl ClassifyWorld {
    fn load(&self, sources: Vec<SourceFeature>, targets: Vec<TargetFeature>) {
        self.sources.replace(sources);
        self.targets.replace(targets);
    }

    fn report(&self) -> AssetReport {
        match self.outcome.borrow().as_ref() {
            Some(Ok(report)) => report.clone(),
            Some(Err(err)) => panic!("reconciliation should succeed, got {err}"),
            None => panic!("reconciliation must run first"),
        }
    }
}

#[fixture]
fn world() -> ClassifyWorld {
    ClassifyWorld::default()
}

#[given("two mergeable sources inside one target")]
fn mergeable_sources(world: &ClassifyWorld) {
    let source = |id: &str, min_x: f64, max_x: f64| {
        SourceFeature::new(id, rect(min_x, 0.0, max_x, 1.0))
            .with_maintainer("Stadsdeel Zuid")
            .with_detailed_kind("Gazon")
    };
    world.load(
        vec![source("S1", 0.0, 10.0), source("S2", 9.0, 15.0)],
        vec![TargetFeature::new("T1", rect(0.0, 0.0, 15.0, 1.0))],
    );
}

#[given("one source covering two adjacent targets")]
fn splittable_source(world: &ClassifyWorld) {
    world.load(
        vec![
            SourceFeature::new("S3", rect(0.0, 0.0, 10.0, 1.0))
                .with_kind("Gras")
                .with_attribute("neighbourhood", "Pijp"),
        ],
        vec![
            TargetFeature::new("T2", rect(0.0, 0.0, 6.0, 1.0)),
            TargetFeature::new("T3", rect(6.0, 0.0, 10.0, 1.0)),
        ],
    );
}

#[given("one elevated source over two stacked targets")]
fn stacked_targets(world: &ClassifyWorld) {
    world.load(
        vec![SourceFeature::new("S4", square(0.0, 0.0, 10.0)).with_elevation(2)],
        vec![
            TargetFeature::new("T4", square(0.0, 0.0, 10.0)).with_elevation(0),
            TargetFeature::new("T5", square(0.0, 0.0, 10.0)).with_elevation(1),
        ],
    );
}

#[given("one source sharing most of a narrower target")]
fn combined_overlap(world: &ClassifyWorld) {
    world.load(
        vec![SourceFeature::new("S5", rect(0.0, 0.0, 10.0, 1.0))],
        vec![TargetFeature::new("T6", rect(4.0, 0.0, 10.3, 1.0))],
    );
}

#[given("one small source inside a large target")]
fn clipped_source(world: &ClassifyWorld) {
    world.load(
        vec![SourceFeature::new("S6", square(0.0, 0.0, 1.0))],
        vec![TargetFeature::new("T7", square(0.0, 0.0, 10.0))],
    );
}

#[given("one source far away from every target")]
fn unmatched_source(world: &ClassifyWorld) {
    world.load(
        vec![SourceFeature::new("S7", square(100.0, 100.0, 1.0))],
        vec![TargetFeature::new("T8", square(0.0, 0.0, 1.0))],
    );
}

#[when("I reconcile them as {asset:word}")]
fn reconcile(world: &ClassifyWorld, asset: String) {
    let asset: AssetType = asset
        .trim_matches('"')
        .parse()
        .unwrap_or_else(|err| panic!("asset type: {err}"));
    let sources = collection(world.sources.borrow().clone());
    let targets = collection(world.targets.borrow().clone());
    let outcome = reconcile_asset(
        asset,
        &sources,
        &targets,
        &MatchConfig::default(),
        &UuidGenerator,
    );
    world.outcome.replace(Some(outcome));
}

#[then("source {id:word} is in bucket {bucket:word}")]
fn source_in_bucket(world: &ClassifyWorld, id: String, bucket: String) {
    let expected = Bucket::from_name(bucket.trim_matches('"'))
        .unwrap_or_else(|| panic!("unknown bucket {bucket}"));
    let report = world.report();
    assert_eq!(
        report.classification.bucket_of(&SourceId::from(id.as_str())),
        Some(expected)
    );
}

#[then("S1 is kept for T1 and S2 is removed")]
fn merge_actions(world: &ClassifyWorld) {
    let report = world.report();
    let pairs = report.plan.accepted_pairs();
    assert_eq!(pairs.len(), 1);
    let pair = pairs.first().expect("one pair");
    assert_eq!(
        (pair.source_id.as_str(), pair.target_id.as_str()),
        ("S1", "T1")
    );
    let removals = report.plan.removals();
    assert_eq!(removals.len(), 1);
    let removal = removals.first().expect("one removal");
    assert_eq!(removal.source_id.as_str(), "S2");
    assert_eq!(removal.superseded_by.as_str(), "S1");
}

#[then("S3 takes the larger target geometry and a new feature covers the smaller")]
fn split_actions(world: &ClassifyWorld) {
    let report = world.report();
    let changes = report.plan.geometry_changes();
    assert_eq!(changes.len(), 1);
    let change = changes.first().expect("one change");
    assert_eq!(change.target_id.as_str(), "T2");
    assert_eq!(change.geometry, rect(0.0, 0.0, 6.0, 1.0));

    let additions = report.plan.additions();
    assert_eq!(additions.len(), 1);
    let addition = additions.first().expect("one addition");
    assert_eq!(addition.target_id.as_str(), "T3");
    assert!(is_brace_uuid(addition.feature.id.as_str()));
    assert_eq!(addition.feature.geometry, rect(6.0, 0.0, 10.0, 1.0));
    assert_eq!(addition.feature.attribute("neighbourhood"), Some("Pijp"));
}

#[then("reconciliation fails naming source {id:word}")]
fn integrity_failure(world: &ClassifyWorld, id: String) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Err(ReconcileError::Integrity {
            asset,
            source: IntegrityError::DuplicateMatch { bucket, source_ids },
        })) => {
            assert_eq!(*asset, AssetType::Terrain);
            assert_eq!(*bucket, Bucket::Geom75Match);
            assert_eq!(source_ids, &vec![SourceId::from(id.as_str())]);
        }
        other => panic!("expected a duplicate match, got {other:?}"),
    }
}

#[then("every automatic source has an action")]
fn audit_is_clean(world: &ClassifyWorld) {
    let report = world.report();
    assert!(report.audit.is_clean(), "audit: {:?}", report.audit);
    assert!(
        report
            .plan
            .actions()
            .all(|action| matches!(action, ReconciliationAction::Keep(_)))
    );
}

#[then("bucket {bucket:word} is pending review")]
fn pending_review(world: &ClassifyWorld, bucket: String) {
    let expected = Bucket::from_name(bucket.trim_matches('"'))
        .unwrap_or_else(|| panic!("unknown bucket {bucket}"));
    assert!(world.report().pending_review.contains(&expected));
}

#[scenario(path = "tests/features/classify.feature", index = 0)]
fn duplicate_sources_are_merged(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 1)]
fn covering_source_is_split(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 2)]
fn stacked_targets_violate_integrity(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 3)]
fn pavement_combined_overlap(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 4)]
fn terrain_leaves_combined_overlap(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 5)]
fn small_source_is_clipped(world: ClassifyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/classify.feature", index = 6)]
fn distant_source_is_unmatched(world: ClassifyWorld) {
    let _ = world;
}
