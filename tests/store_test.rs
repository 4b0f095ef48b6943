use hdstore::store::normalize_path;
use hdstore::{DataStore, DenseMatrix, Error, OpenMode, DEFAULT_THRESHOLD};
use proptest::prelude::*;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn fresh_store(name: &str) -> (TempDir, PathBuf, DataStore) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    let mut store = DataStore::new();
    store.open(&path, OpenMode::ReadWriteTruncate).unwrap();
    (dir, path, store)
}

#[test]
fn test_matrix_round_trip() {
    let (_dir, _path, mut store) = fresh_store("matrix.hds");

    let mut mat = DenseMatrix::zeros(10, 10);
    for row in 0..10 {
        for col in 0..10 {
            mat.set(row, col, (row * col * col + row + col) as f64);
        }
    }

    store.write_matrix("/Group1/Group2/Data", &mat).unwrap();
    let read = store.read_matrix("/Group1/Group2/Data").unwrap();
    assert!(mat.approx_eq(&read, 1e-12), "matrix read does not match matrix written");

    store.close().unwrap();
}

#[test]
fn test_flat_vector_round_trip() {
    let (_dir, _path, mut store) = fresh_store("vector.hds");

    let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0 + i as f64 / 5.0).collect();
    store.write_dataset("/Group1/Group2/Data", &values, &[10, 10]).unwrap();

    let (read, shape) = store.read_dataset("/Group1/Group2/Data").unwrap();
    assert_eq!(shape, vec![10, 10]);
    assert_eq!(read, values);

    store.close().unwrap();
}

#[test]
fn test_thresholds() {
    let mut store = DataStore::new();
    assert_eq!(store.threshold(), DEFAULT_THRESHOLD);

    let threshold = 12usize;
    store.set_threshold(threshold);
    assert_eq!(store.threshold(), threshold);

    assert!(!store.exceeds_threshold(threshold - 1));
    assert!(!store.exceeds_threshold(threshold));
    assert!(store.exceeds_threshold(threshold + 1));

    let num_doubles = threshold / std::mem::size_of::<f64>();

    assert!(!store.values_exceed_threshold(&vec![0.0; num_doubles]));
    assert!(store.values_exceed_threshold(&vec![0.0; num_doubles + 1]));

    assert!(!store.matrix_exceeds_threshold(&DenseMatrix::zeros(1, num_doubles)));
    assert!(store.matrix_exceeds_threshold(&DenseMatrix::zeros(1, num_doubles + 1)));
}

#[test]
fn test_dataset_interaction() {
    let (_dir, _path, mut store) = fresh_store("interaction.hds");

    let mat = DenseMatrix::zeros(1, 1);
    let vec_values = vec![0.0; 27];

    store.write_dataset("/TLDData", &vec_values, &[3, 3, 3]).unwrap();
    store.write_matrix("/Group1/DeeperData", &mat).unwrap();
    store.write_matrix("/Group1/Group2/EvenDeeperData", &mat).unwrap();
    store.write_matrix("/Group1/DeeperDataSibling", &mat).unwrap();
    store.write_matrix("/Group1/Group2a/Grandchild", &mat).unwrap();
    store.write_matrix("/Group1/Group2a/Group3/Group4/Group5/Deeeep", &mat).unwrap();
    store.write_matrix("/TLDataSibling", &mat).unwrap();

    let expected = vec![
        "Group1/DeeperData".to_string(),
        "Group1/DeeperDataSibling".to_string(),
        "Group1/Group2/EvenDeeperData".to_string(),
        "Group1/Group2a/Grandchild".to_string(),
        "Group1/Group2a/Group3/Group4/Group5/Deeeep".to_string(),
        "TLDData".to_string(),
        "TLDataSibling".to_string(),
    ];
    assert_eq!(store.datasets(), expected);

    assert!(!store.dataset_exists("/IShouldNotExist"));

    assert_eq!(store.dataset_dimensions("/Group1/DeeperData"), vec![1, 1]);
    assert_eq!(store.dataset_dimensions("/TLDData"), vec![3, 3, 3]);
    assert!(store.dataset_dimensions("/IShouldNotExist").is_empty());

    // Removing one dataset leaves its sibling intact.
    store.remove_dataset("/Group1/DeeperData").unwrap();
    assert!(!store.dataset_exists("/Group1/DeeperData"));
    assert!(store.dataset_exists("/Group1/DeeperDataSibling"));

    for path in &expected[1..] {
        assert!(store.dataset_exists(path), "dataset should exist: {path}");
        store.remove_dataset(path).unwrap();
        assert!(!store.dataset_exists(path), "removed dataset still exists: {path}");
    }
    assert!(store.datasets().is_empty());

    store.close().unwrap();
}

#[test]
fn test_deep_path_auto_creates_groups() {
    let (_dir, _path, mut store) = fresh_store("deep.hds");

    let mat = DenseMatrix::zeros(2, 3);
    store.write_matrix("Group1/Group2a/Group3/Group4/Group5/Deeeep", &mat).unwrap();

    let listed = store.datasets();
    assert_eq!(listed, vec!["Group1/Group2a/Group3/Group4/Group5/Deeeep".to_string()]);

    store.close().unwrap();
}

#[test]
fn test_append_preserves_existing_datasets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("append.hds");

    let first: Vec<f64> = (0..50).map(|i| i as f64 * 0.25).collect();
    {
        let mut store = DataStore::new();
        store.open(&path, OpenMode::ReadWriteTruncate).unwrap();
        store.write_dataset("Group1/First", &first, &[50]).unwrap();
        store.write_dataset("Group1/Second", &[1.0, 2.0, 3.0], &[3]).unwrap();
        store.close().unwrap();
    }
    {
        let mut store = DataStore::new();
        store.open(&path, OpenMode::ReadWriteAppend).unwrap();
        assert_eq!(store.datasets().len(), 2);
        store.write_dataset("Group2/Third", &[4.0, 5.0], &[2]).unwrap();
        store.close().unwrap();
    }

    let mut store = DataStore::new();
    store.open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(
        store.datasets(),
        vec![
            "Group1/First".to_string(),
            "Group1/Second".to_string(),
            "Group2/Third".to_string()
        ]
    );
    let (read, shape) = store.read_dataset("Group1/First").unwrap();
    assert_eq!(shape, vec![50]);
    assert_eq!(read, first);
    store.close().unwrap();
}

#[test]
fn test_read_only_listing_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("listing.hds");

    {
        let mut store = DataStore::new();
        store.open(&path, OpenMode::ReadWriteTruncate).unwrap();
        store.write_dataset("Data", &[1.0], &[1]).unwrap();
        store.write_dataset("Group1/Group2/Data", &[2.0], &[1]).unwrap();
        store.write_dataset("Test/RecordData/Matrix1", &[3.0], &[1]).unwrap();
        store.close().unwrap();
    }

    let mut store = DataStore::new();
    store.open(&path, OpenMode::ReadOnly).unwrap();
    let expected = vec![
        "Data".to_string(),
        "Group1/Group2/Data".to_string(),
        "Test/RecordData/Matrix1".to_string(),
    ];
    assert_eq!(store.datasets(), expected);
    assert_eq!(store.datasets(), expected);

    // Mutation is refused in read-only mode.
    assert!(matches!(
        store.write_dataset("Nope", &[0.0], &[1]),
        Err(Error::State(_))
    ));
    assert!(matches!(store.remove_dataset("Data"), Err(Error::State(_))));

    store.close().unwrap();
}

#[test]
fn test_replace_semantics() {
    let (_dir, _path, mut store) = fresh_store("replace.hds");

    store.write_dataset("Group/Data", &[1.0, 2.0], &[2]).unwrap();
    store.write_dataset("Group/Data", &[7.0, 8.0, 9.0], &[3]).unwrap();

    let (read, shape) = store.read_dataset("Group/Data").unwrap();
    assert_eq!(shape, vec![3]);
    assert_eq!(read, vec![7.0, 8.0, 9.0]);
    assert_eq!(store.datasets(), vec!["Group/Data".to_string()]);

    store.close().unwrap();
}

#[test]
fn test_state_errors() {
    let mut store = DataStore::new();

    assert!(matches!(store.close(), Err(Error::State(_))));
    assert!(matches!(
        store.write_dataset("Data", &[1.0], &[1]),
        Err(Error::State(_))
    ));
    assert!(matches!(store.read_dataset("Data"), Err(Error::State(_))));
    assert!(!store.dataset_exists("Data"));
    assert!(store.datasets().is_empty());

    // ReadOnly open of a nonexistent file fails and leaves the store closed.
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.hds");
    assert!(matches!(store.open(&missing, OpenMode::ReadOnly), Err(Error::Io(_))));
    assert!(!store.is_open());

    let path = dir.path().join("state.hds");
    store.open(&path, OpenMode::ReadWriteTruncate).unwrap();
    assert!(matches!(
        store.open(&path, OpenMode::ReadWriteAppend),
        Err(Error::State(_))
    ));
    store.close().unwrap();
    assert!(!store.is_open());
}

#[test]
fn test_path_normalization_equivalence() {
    let (_dir, _path, mut store) = fresh_store("norm.hds");

    store.write_dataset("/Group1/Data", &[1.0], &[1]).unwrap();
    assert!(store.dataset_exists("Group1/Data"));
    assert_eq!(store.datasets(), vec!["Group1/Data".to_string()]);

    // The bare spelling replaces, not duplicates.
    store.write_dataset("Group1/Data", &[2.0], &[1]).unwrap();
    assert_eq!(store.datasets().len(), 1);

    store.close().unwrap();
}

#[test]
fn test_path_typing_conflicts() {
    let (_dir, _path, mut store) = fresh_store("conflict.hds");

    store.write_dataset("A/B", &[1.0], &[1]).unwrap();

    // A dataset may not be created on the route to an existing one, and an
    // existing dataset may not become a group.
    assert!(matches!(store.write_dataset("A", &[1.0], &[1]), Err(Error::Format(_))));
    assert!(matches!(
        store.write_dataset("A/B/C", &[1.0], &[1]),
        Err(Error::Format(_))
    ));

    store.close().unwrap();
}

#[test]
fn test_invalid_arguments() {
    let (_dir, _path, mut store) = fresh_store("invalid.hds");

    assert!(matches!(store.write_dataset("", &[1.0], &[1]), Err(Error::Format(_))));
    assert!(matches!(store.write_dataset("Data", &[1.0], &[]), Err(Error::Format(_))));
    assert!(matches!(
        store.write_dataset("Data", &[1.0], &[1, 0]),
        Err(Error::Format(_))
    ));
    assert!(matches!(
        store.write_dataset("Data", &[1.0, 2.0, 3.0], &[2, 2]),
        Err(Error::Format(_))
    ));

    store.close().unwrap();
}

#[test]
fn test_missing_and_mismatched_reads() {
    let (_dir, _path, mut store) = fresh_store("missing.hds");

    assert!(matches!(store.read_dataset("Nope"), Err(Error::NotFound(_))));
    assert!(matches!(store.remove_dataset("Nope"), Err(Error::NotFound(_))));

    store.write_dataset("Cube", &vec![0.0; 8], &[2, 2, 2]).unwrap();
    store.write_dataset("Line", &[1.0, 2.0], &[2]).unwrap();
    assert!(matches!(store.read_matrix("Cube"), Err(Error::ShapeMismatch(3))));
    assert!(matches!(store.read_matrix("Line"), Err(Error::ShapeMismatch(1))));

    store.close().unwrap();
}

#[test]
fn test_large_dataset_round_trip() {
    let (_dir, _path, mut store) = fresh_store("large.hds");

    // Large enough to take the compressed-block path.
    let values: Vec<f64> = (0..10_000).map(|i| (i % 17) as f64 * 0.5).collect();
    store.write_dataset("Big/Matrix", &values, &[100, 100]).unwrap();

    let (read, shape) = store.read_dataset("Big/Matrix").unwrap();
    assert_eq!(shape, vec![100, 100]);
    assert_eq!(read, values);

    store.close().unwrap();
}

#[test]
fn test_malformed_paths_rejected() {
    for path in ["", "/", "a//b", "a/", "/a/"] {
        assert!(normalize_path(path).is_err(), "path '{path}' should be rejected");
    }
}

proptest! {
    #[test]
    fn prop_leading_slash_is_optional(
        segments in prop::collection::vec("[A-Za-z][A-Za-z0-9]{0,8}", 1..5)
    ) {
        let bare = segments.join("/");
        let slashed = format!("/{bare}");
        prop_assert_eq!(normalize_path(&bare).unwrap(), normalize_path(&slashed).unwrap());
        prop_assert_eq!(normalize_path(&bare).unwrap(), bare);
    }
}
