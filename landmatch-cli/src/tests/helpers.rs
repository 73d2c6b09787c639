//! Test helpers for composing batch documents on disk.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use landmatch_core::test_support::square;
use landmatch_core::{AssetType, Crs, SourceFeature, TargetFeature};
use tempfile::TempDir;

use crate::document::BatchDocument;

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write test file");
}

/// Temporary directory exposed as a UTF-8 path.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn write_batch(&self, name: &str, batch: &BatchDocument) -> Utf8PathBuf {
        let path = self.path(name);
        let payload = serde_json::to_vec(batch).expect("serialise batch");
        write_utf8(&path, &payload);
        path
    }
}

/// Terrain source `{A}` exactly over target `T1`; pavement source `{P}` far
/// from every target.
pub(super) fn sample_batch() -> BatchDocument {
    BatchDocument {
        crs: Some(Crs::epsg(28992)),
        targets: vec![TargetFeature::new("T1", square(0.0, 0.0, 10.0))],
        sources: BTreeMap::from([
            (
                AssetType::Terrain,
                vec![SourceFeature::new("{A}", square(0.0, 0.0, 10.0)).with_kind("Gras")],
            ),
            (
                AssetType::Pavement,
                vec![SourceFeature::new("{P}", square(50.0, 50.0, 5.0)).with_kind("Tegels")],
            ),
        ]),
    }
}
