//! Integration tests for rolling sink rotation and pruning.

use std::{fs, path::Path};

use tracespool::RollingSink;

fn rotated_names(dir: &Path, active: &str) -> Vec<String> {
    let prefix = format!("{}.", active);
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(&prefix))
        .collect();
    names.sort();
    names
}

fn rotated_contents(dir: &Path, active: &str) -> String {
    rotated_names(dir, active)
        .iter()
        .map(|name| fs::read_to_string(dir.join(name)).unwrap())
        .collect()
}

/// Rolls beyond the history limit drop the oldest segments first.
#[test]
fn history_limit_prunes_oldest_segments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let sink = RollingSink::open(&path, "UTF-8", 2, 0).unwrap();

    for payload in ["aaa", "bbb", "ccc", "ddd"] {
        sink.write(payload).unwrap();
        sink.roll().unwrap();
    }

    assert_eq!(rotated_names(dir.path(), "trace.log").len(), 2);

    let survivors = rotated_contents(dir.path(), "trace.log");
    assert!(!survivors.contains("aaa"));
    assert!(!survivors.contains("bbb"));
    assert!(survivors.contains("ccc"));
    assert!(survivors.contains("ddd"));
}

/// With a 10 KB cap and history 3, segments are pruned oldest first once
/// their summed size crosses the cap, and at most 3 persist at any time.
#[test]
fn size_cap_prunes_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let sink = RollingSink::open(&path, "UTF-8", 3, 10 * 1024).unwrap();

    // Each rotated segment ends up slightly over 4 KB, so the third roll
    // pushes the total past the cap.
    for marker in ["a", "b", "c"] {
        sink.write(&marker.repeat(4096)).unwrap();
        sink.roll().unwrap();
        assert!(rotated_names(dir.path(), "trace.log").len() <= 3);
    }

    let rotated = rotated_names(dir.path(), "trace.log");
    assert_eq!(rotated.len(), 2);

    let survivors = rotated_contents(dir.path(), "trace.log");
    assert!(!survivors.contains('a'));
    assert!(survivors.contains('b'));
    assert!(survivors.contains('c'));
}

/// A roll moves the active content aside; later writes land in a fresh
/// active segment.
#[test]
fn roll_opens_a_fresh_active_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let sink = RollingSink::open(&path, "UTF-8", 7, 0).unwrap();

    sink.write("before").unwrap();
    sink.roll().unwrap();
    sink.write("after").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "after\n\n");
    let survivors = rotated_contents(dir.path(), "trace.log");
    assert_eq!(survivors, "before\n\n");
}

/// Rolling more than once on the same date yields distinct sequence
/// suffixes on the rotated names.
#[test]
fn same_day_rolls_use_sequence_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let sink = RollingSink::open(&path, "UTF-8", 7, 0).unwrap();

    sink.write("one").unwrap();
    sink.roll().unwrap();
    sink.write("two").unwrap();
    sink.roll().unwrap();

    let rotated = rotated_names(dir.path(), "trace.log");
    assert_eq!(rotated.len(), 2);
    assert_eq!(rotated[1], format!("{}.1", rotated[0]));
}

/// Parent directories are created on demand.
#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("trace.log");

    let sink = RollingSink::open(&path, "UTF-8", 7, 0).unwrap();
    sink.write("present").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "present\n\n");
}
