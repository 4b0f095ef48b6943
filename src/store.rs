//! Path-addressed dataset store — the primary embedding surface.
//!
//! ```no_run
//! use hdstore::{DataStore, DenseMatrix, OpenMode};
//!
//! let mut store = DataStore::new();
//! store.open("results.hds", OpenMode::ReadWriteTruncate)?;
//!
//! let mut mat = DenseMatrix::zeros(10, 10);
//! mat.set(3, 4, 1.5);
//! store.write_matrix("/Group1/Group2/Data", &mat)?;
//!
//! let back = store.read_matrix("Group1/Group2/Data")?;
//! assert!(mat.approx_eq(&back, 1e-12));
//! store.close()?;
//! # Ok::<(), hdstore::Error>(())
//! ```
//!
//! Paths use "/" as the hierarchy separator; one leading slash is optional.
//! Intermediate groups are implicit and created on demand.  A store instance
//! exclusively owns its backing container; callers serialize access
//! externally.

use std::mem::size_of;
use std::path::Path;

use tracing::debug;

use crate::container::{ContainerFile, OpenMode};
use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

/// Default inline-vs-external boundary in bytes.
pub const DEFAULT_THRESHOLD: usize = 1024;

pub struct DataStore {
    handle: Option<ContainerFile>,
    threshold: usize,
}

impl DataStore {
    /// A closed store with the default threshold.
    pub fn new() -> Self {
        Self { handle: None, threshold: DEFAULT_THRESHOLD }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Open a container file.  Fails without side effects when the store is
    /// already open or the container cannot be opened in `mode`.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::State("store is already open; close it first".into()));
        }
        let container = ContainerFile::open(path.as_ref(), mode)?;
        debug!(path = %path.as_ref().display(), ?mode, "store opened");
        self.handle = Some(container);
        Ok(())
    }

    /// Flush and release the backing container.
    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(container) => container.close(),
            None => Err(Error::State("store is not open".into())),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn container_mut(&mut self) -> Result<&mut ContainerFile> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::State("store is not open".into()))
    }

    // ── Dataset I/O ──────────────────────────────────────────────────────────

    /// Write a rank-2 dataset with shape (rows, cols), replacing any dataset
    /// already at `path`.
    pub fn write_matrix(&mut self, path: &str, matrix: &DenseMatrix) -> Result<()> {
        let shape = [matrix.rows() as u64, matrix.cols() as u64];
        self.write_dataset(path, matrix.as_slice(), &shape)
    }

    /// Write an N-dimensional dataset, creating any missing intermediate
    /// groups.  The shape product must equal the value count and every
    /// dimension must be positive.
    pub fn write_dataset(&mut self, path: &str, values: &[f64], shape: &[u64]) -> Result<()> {
        let normalized = normalize_path(path)?;
        if shape.is_empty() {
            return Err(Error::Format("dataset shape needs at least one dimension".into()));
        }
        if shape.iter().any(|&dim| dim == 0) {
            return Err(Error::Format(format!("dataset shape {shape:?} has a zero dimension")));
        }
        let expected: u64 = shape.iter().product();
        if values.len() as u64 != expected {
            return Err(Error::Format(format!(
                "shape {shape:?} implies {expected} values, got {}",
                values.len()
            )));
        }
        self.container_mut()?.put(&normalized, shape, values)
    }

    /// Read a rank-2 dataset back as a matrix.
    pub fn read_matrix(&mut self, path: &str) -> Result<DenseMatrix> {
        let (values, shape) = self.read_dataset(path)?;
        if shape.len() != 2 {
            return Err(Error::ShapeMismatch(shape.len()));
        }
        DenseMatrix::from_vec(shape[0] as usize, shape[1] as usize, values)
    }

    /// Read a dataset's values and shape.  An absent path is a distinct
    /// [`Error::NotFound`], never an empty shape.
    pub fn read_dataset(&mut self, path: &str) -> Result<(Vec<f64>, Vec<u64>)> {
        let normalized = normalize_path(path)?;
        self.container_mut()?.get(&normalized)
    }

    /// True iff a dataset (not merely a group) exists at the normalized
    /// path.  Never fails: a closed store or malformed path reads as absent.
    pub fn dataset_exists(&self, path: &str) -> bool {
        match (&self.handle, normalize_path(path)) {
            (Some(container), Ok(normalized)) => container.contains(&normalized),
            _ => false,
        }
    }

    /// Remove exactly the dataset at `path`; sibling datasets and ancestor
    /// groups stay intact.
    pub fn remove_dataset(&mut self, path: &str) -> Result<()> {
        let normalized = normalize_path(path)?;
        self.container_mut()?.remove(&normalized)?;
        debug!(path = %normalized, "dataset removed");
        Ok(())
    }

    /// Every dataset path currently stored, normalized and sorted
    /// lexicographically ascending.  Recomputed on each call.
    pub fn datasets(&self) -> Vec<String> {
        self.handle.as_ref().map(ContainerFile::list).unwrap_or_default()
    }

    /// The dataset's shape, one entry per dimension; empty when absent.
    pub fn dataset_dimensions(&self, path: &str) -> Vec<u64> {
        match (&self.handle, normalize_path(path)) {
            (Some(container), Ok(normalized)) => {
                container.shape(&normalized).map(<[u64]>::to_vec).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    // ── Threshold policy ─────────────────────────────────────────────────────

    pub fn set_threshold(&mut self, bytes: usize) {
        self.threshold = bytes;
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Strictly greater-than: a payload exactly at the threshold stays
    /// inline.  Pure predicate, never touches the open file.
    pub fn exceeds_threshold(&self, byte_count: usize) -> bool {
        byte_count > self.threshold
    }

    pub fn matrix_exceeds_threshold(&self, matrix: &DenseMatrix) -> bool {
        self.exceeds_threshold(matrix.len() * size_of::<f64>())
    }

    pub fn values_exceed_threshold(&self, values: &[f64]) -> bool {
        self.exceeds_threshold(values.len() * size_of::<f64>())
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a dataset path: strip one optional leading "/" and require
/// every segment to be non-empty.  Two paths normalizing identically address
/// the same dataset.
pub fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(Error::Format("dataset path is empty".into()));
    }
    if trimmed.split('/').any(str::is_empty) {
        return Err(Error::Format(format!("malformed dataset path '{path}'")));
    }
    Ok(trimmed.to_owned())
}
