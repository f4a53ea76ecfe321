//! End-to-end rescue against a scripted oracle and a real image file

mod common;

use common::{expected_bytes, image, reference_tree, ScriptedRunner, BLOCKSIZE};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use xfsaid_core::recovery::{RescueEvent, RescueOrchestrator, RescueStatus};
use xfsaid_core::{DirectoryScanner, FileHandle, MetadataOracle, RescueConfig, XfsAidError};

#[test]
fn test_rescue_reference_tree() {
    let image = image();
    let target = TempDir::new().unwrap();
    let root = target.path().join("out");
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());

    let orchestrator = RescueOrchestrator::new(&oracle, &root, RescueConfig::default()).unwrap();
    let mut progress = Vec::new();
    let report = orchestrator
        .run(|event| {
            if let RescueEvent::Rebuilding { ino, size, .. } = event {
                progress.push((ino, size));
            }
        })
        .unwrap();

    // pre-order: /a/x comes before the root's own files
    assert_eq!(progress, vec![(202, 100), (131, 2500)]);
    assert_eq!(report.total_files, 2);
    assert_eq!(report.rescued_files, 2);
    assert_eq!(report.failed_files, 0);
    assert_eq!(report.damaged_objects, 2);
    assert_eq!(report.total_bytes_rescued, 2600);

    let a_txt = std::fs::read(root.join("a.txt")).unwrap();
    assert_eq!(a_txt.len(), 2500);
    assert_eq!(a_txt, expected_bytes(&[10, 11, 12, 20, 21], 2500));

    let x = std::fs::read(root.join("a").join("x")).unwrap();
    assert_eq!(x, expected_bytes(&[30], 100));

    assert!(!root.join("big.bin").exists());
    assert!(!root.join("a").join("b").exists());

    let outcome = report.outcomes.iter().find(|o| o.ino == 131).unwrap();
    assert_eq!(outcome.status, RescueStatus::Rescued);
    assert_eq!(outcome.target, root.join("a.txt"));
    assert_eq!(
        outcome.sha256.as_deref(),
        Some(format!("{:x}", Sha256::digest(&a_txt)).as_str())
    );
}

#[test]
fn test_absolute_name_is_not_written_outside_target() {
    let image = image();
    let target = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let outside = elsewhere.path().join("escaped.txt");
    let name = outside.to_str().unwrap().to_string();
    let root = target.path().join("out");

    let mut runner = reference_tree();
    runner
        .root(&[
            (200, "directory", "a"),
            (131, "regular", "a.txt"),
            (132, "regular", "big.bin"),
            (133, "regular", name.as_str()),
        ])
        .file(133, 100, &[(0, 30, 1)]);
    let oracle = MetadataOracle::with_runner(image.path(), runner);

    let report = RescueOrchestrator::new(&oracle, &root, RescueConfig::default())
        .unwrap()
        .run(|_| {})
        .unwrap();

    assert!(!outside.exists());
    assert!(report.outcomes.iter().all(|o| o.target.starts_with(&root)));
    assert!(report.outcomes.iter().all(|o| o.ino != 133));
    assert_eq!(report.damaged_objects, 3);
    assert_eq!(report.rescued_files, 2);
}

#[test]
fn test_directory_cycle_does_not_stall_rescue() {
    let image = image();
    let target = TempDir::new().unwrap();
    let mut runner = reference_tree();
    runner.dir(200, "/a", &[(200, "directory", "loop"), (202, "regular", "x")]);
    let oracle = MetadataOracle::with_runner(image.path(), runner);

    let report = RescueOrchestrator::new(&oracle, target.path(), RescueConfig::default())
        .unwrap()
        .run(|_| {})
        .unwrap();
    assert_eq!(report.rescued_files, 2);
    assert_eq!(report.damaged_objects, 2);
    assert!(target.path().join("a").join("x").exists());
}

#[test]
fn test_rescue_without_digest() {
    let image = image();
    let target = TempDir::new().unwrap();
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());
    let config = RescueConfig {
        compute_digest: false,
    };

    let report = RescueOrchestrator::new(&oracle, target.path(), config)
        .unwrap()
        .run(|_| {})
        .unwrap();
    assert_eq!(report.rescued_files, 2);
    assert!(report.outcomes.iter().all(|o| o.sha256.is_none()));
}

#[test]
fn test_non_empty_target_makes_no_queries() {
    let image = image();
    let target = TempDir::new().unwrap();
    std::fs::create_dir(target.path().join("leftover")).unwrap();
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());

    let result = RescueOrchestrator::new(&oracle, target.path(), RescueConfig::default());
    assert!(matches!(result, Err(XfsAidError::DirectoryNotEmpty { .. })));
    assert!(oracle.runner().calls().is_empty());
}

#[test]
fn test_target_that_is_a_file_is_rejected() {
    let image = image();
    let target = TempDir::new().unwrap();
    let file = target.path().join("plain");
    std::fs::write(&file, b"").unwrap();
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());

    let result = RescueOrchestrator::new(&oracle, &file, RescueConfig::default());
    assert!(matches!(result, Err(XfsAidError::TargetNotDirectory { .. })));
}

#[test]
fn test_failed_file_leaves_no_artifact() {
    let image = image();
    let target = TempDir::new().unwrap();
    let mut runner = reference_tree();
    // block 100 lies past the end of the 64-block image
    runner.file(131, 2500, &[(0, 100, 5)]);
    let oracle = MetadataOracle::with_runner(image.path(), runner);

    let mut failures = Vec::new();
    let report = RescueOrchestrator::new(&oracle, target.path(), RescueConfig::default())
        .unwrap()
        .run(|event| {
            if let RescueEvent::Finished(outcome) = event {
                if !outcome.is_rescued() {
                    failures.push(outcome.ino);
                }
            }
        })
        .unwrap();

    assert_eq!(failures, vec![131]);
    assert_eq!(report.rescued_files, 1);
    assert_eq!(report.failed_files, 1);
    assert!(!target.path().join("a.txt").exists());
    // the rescue carried on past the failure
    assert!(target.path().join("a").join("x").exists());
}

#[test]
fn test_unlistable_root_is_fatal() {
    let image = image();
    let target = TempDir::new().unwrap();
    let mut runner = reference_tree();
    runner.forget("ls /");
    let oracle = MetadataOracle::with_runner(image.path(), runner);

    let result = RescueOrchestrator::new(&oracle, target.path(), RescueConfig::default())
        .unwrap()
        .run(|_| {});
    assert!(matches!(result, Err(XfsAidError::OracleCommand { .. })));
}

#[test]
fn test_dump_refuses_existing_target() {
    let image = image();
    let target = TempDir::new().unwrap();
    let existing = target.path().join("a.txt");
    std::fs::write(&existing, b"keep me").unwrap();
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());

    let file = FileHandle::open(&oracle, 131).unwrap();
    assert!(matches!(
        file.dump(&existing, true),
        Err(XfsAidError::TargetExists { .. })
    ));
    assert_eq!(std::fs::read(&existing).unwrap(), b"keep me");
}

#[test]
fn test_raw_and_block_map() {
    let image = image();
    let oracle = MetadataOracle::with_runner(image.path(), reference_tree());
    let file = FileHandle::open(&oracle, 131).unwrap();

    let extents = file.extents().unwrap();
    let lines: Vec<String> = extents.iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["0: [0..3]: 10..13", "1: [3..5]: 20..22"]);
    assert_eq!(file.summary().unwrap().to_string(), "2500 bytes in 2 extents 5 blocks");

    let mut out = Vec::new();
    assert_eq!(file.raw(&mut out).unwrap(), 2500);
    assert_eq!(out, expected_bytes(&[10, 11, 12, 20, 21], 2500));
}

#[test]
fn test_inode_mismatch() {
    let mut runner = ScriptedRunner::new();
    runner
        .superblock(BLOCKSIZE)
        .reply("inode 131; print", "core.size = 10\nv3.inumber = 999\n");
    let oracle = MetadataOracle::with_runner("disk.img", runner);

    assert!(matches!(
        FileHandle::open(&oracle, 131),
        Err(XfsAidError::InodeMismatch {
            requested: 131,
            reported: 999
        })
    ));
}

#[test]
fn test_scan_views_over_reference_tree() {
    let oracle = MetadataOracle::with_runner("disk.img", reference_tree());
    let scanner = DirectoryScanner::new(&oracle);

    let all: Vec<String> = scanner.objects().map(|e| e.path).collect();
    assert_eq!(all, vec!["/a", "/a/b", "/a/x", "/a.txt", "/big.bin"]);

    let damaged: Vec<String> = scanner.damaged().map(|e| e.path).collect();
    assert_eq!(damaged, vec!["/a/b", "/big.bin"]);

    let files: Vec<String> = scanner.files().map(|e| e.path).collect();
    assert_eq!(files, vec!["/a/x", "/a.txt"]);
}
