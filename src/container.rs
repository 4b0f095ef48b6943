//! Single-file container engine.
//!
//! Layout: superblock at offset 0, dataset blocks appended after it, and the
//! JSON index in a trailing block.  The superblock is patched in place on
//! close to point at the index.  Replacing or removing a dataset edits the
//! index only; orphaned blocks are not reclaimed.
//!
//! Groups are implicit: the index maps full normalized paths to block
//! offsets, and a path prefix "exists" as a group exactly when some dataset
//! lives under it.  The only typing rule enforced here is that a dataset may
//! never sit on the route to another dataset.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::block::{bytes_to_values, decode_block, encode_block, values_to_bytes, BlockHeader};
use crate::error::{Error, Result};
use crate::index::{DatasetEntry, DatasetIndex};
use crate::superblock::{Superblock, SUPERBLOCK_SIZE};

/// How [`ContainerFile::open`] treats existing content at the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The file must exist and carry a valid superblock; all mutation fails.
    ReadOnly,
    /// Existing datasets are preserved; a missing or empty file becomes a
    /// fresh container.
    ReadWriteAppend,
    /// A fresh container, discarding any prior content at the path.
    ReadWriteTruncate,
}

impl OpenMode {
    pub fn writable(self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }
}

pub struct ContainerFile {
    file: File,
    path: PathBuf,
    mode: OpenMode,
    superblock: Superblock,
    index: DatasetIndex,
    /// Where the next block goes; in append mode this starts at the old
    /// index offset, so the stale index region is overwritten first.
    data_end: u64,
    /// True when the on-disk index matches the in-memory one (or the
    /// container is read-only).
    finalized: bool,
}

impl ContainerFile {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        match mode {
            OpenMode::ReadOnly => {
                let mut file = File::open(path)?;
                let (superblock, index) = Self::load(&mut file)?;
                let data_end = superblock.index_offset;
                Ok(Self {
                    file,
                    path: path.to_owned(),
                    mode,
                    superblock,
                    index,
                    data_end,
                    finalized: true,
                })
            }
            OpenMode::ReadWriteAppend => {
                let mut file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)?;
                if file.metadata()?.len() == 0 {
                    Self::init_fresh(file, path, mode)
                } else {
                    let (superblock, index) = Self::load(&mut file)?;
                    let data_end = superblock.index_offset;
                    Ok(Self {
                        file,
                        path: path.to_owned(),
                        mode,
                        superblock,
                        index,
                        data_end,
                        finalized: false,
                    })
                }
            }
            OpenMode::ReadWriteTruncate => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                Self::init_fresh(file, path, mode)
            }
        }
    }

    /// Reserve the superblock region of a brand-new container; the real
    /// superblock is patched in on close.
    fn init_fresh(mut file: File, path: &Path, mode: OpenMode) -> Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&[0u8; SUPERBLOCK_SIZE])?;
        Ok(Self {
            file,
            path: path.to_owned(),
            mode,
            superblock: Superblock::new(),
            index: DatasetIndex::default(),
            data_end: SUPERBLOCK_SIZE as u64,
            finalized: false,
        })
    }

    fn load(file: &mut File) -> Result<(Superblock, DatasetIndex)> {
        file.seek(SeekFrom::Start(0))?;
        let superblock = Superblock::read(&mut *file)?;
        if superblock.index_offset == 0 {
            return Err(Error::Format(
                "container has no index; the writer was never closed".into(),
            ));
        }
        file.seek(SeekFrom::Start(superblock.index_offset))?;
        let header = BlockHeader::read(&mut *file)?;
        let mut payload = vec![0u8; header.stored_len as usize];
        file.read_exact(&mut payload)?;
        let raw = decode_block(&header, &payload)?;
        let index = DatasetIndex::from_bytes(&raw)
            .map_err(|e| Error::Format(format!("unreadable dataset index: {e}")))?;
        Ok((superblock, index))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode.writable() {
            Ok(())
        } else {
            Err(Error::State("container is open read-only".into()))
        }
    }

    /// A dataset may not pass through another dataset in either direction:
    /// every non-leaf segment must be a group, and the leaf must not already
    /// be a group.
    fn check_path_typing(&self, path: &str) -> Result<()> {
        for existing in self.index.datasets.keys() {
            if existing == path {
                continue; // replace semantics
            }
            if path.len() > existing.len()
                && path.starts_with(existing.as_str())
                && path.as_bytes()[existing.len()] == b'/'
            {
                return Err(Error::Format(format!(
                    "path component '{existing}' is a dataset, not a group"
                )));
            }
            if existing.len() > path.len()
                && existing.starts_with(path)
                && existing.as_bytes()[path.len()] == b'/'
            {
                return Err(Error::Format(format!(
                    "'{path}' is a group containing '{existing}'"
                )));
            }
        }
        Ok(())
    }

    /// Create or replace the dataset at an already-normalized path.
    pub fn put(&mut self, path: &str, shape: &[u64], values: &[f64]) -> Result<()> {
        self.require_writable()?;
        self.check_path_typing(path)?;

        let raw = values_to_bytes(values);
        let (header, payload) = encode_block(&raw);
        let offset = self.data_end;
        self.file.seek(SeekFrom::Start(offset))?;
        header.write(&mut self.file)?;
        self.file.write_all(&payload)?;
        self.data_end = self.file.stream_position()?;

        self.index
            .datasets
            .insert(path.to_owned(), DatasetEntry { offset, shape: shape.to_vec() });
        self.finalized = false;
        debug!(path, raw_len = raw.len(), stored_len = payload.len(), "dataset block written");
        Ok(())
    }

    /// Values plus shape of the dataset at an already-normalized path.
    pub fn get(&mut self, path: &str) -> Result<(Vec<f64>, Vec<u64>)> {
        let entry = self
            .index
            .datasets
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;

        self.file.seek(SeekFrom::Start(entry.offset))?;
        let header = BlockHeader::read(&mut self.file)?;
        let mut payload = vec![0u8; header.stored_len as usize];
        self.file.read_exact(&mut payload)?;
        let raw = decode_block(&header, &payload)?;
        let values = bytes_to_values(&raw)?;

        let expected: u64 = entry.shape.iter().product();
        if values.len() as u64 != expected {
            return Err(Error::Format(format!(
                "dataset '{path}' holds {} values but its shape implies {expected}",
                values.len()
            )));
        }
        Ok((values, entry.shape))
    }

    /// Drop the dataset from the index.  The block itself is orphaned, so
    /// sibling datasets and ancestor groups are untouched.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        self.require_writable()?;
        self.index
            .datasets
            .remove(path)
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        self.finalized = false;
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.datasets.contains_key(path)
    }

    /// All dataset paths, lexicographically ascending.
    pub fn list(&self) -> Vec<String> {
        self.index.datasets.keys().cloned().collect()
    }

    pub fn shape(&self, path: &str) -> Option<&[u64]> {
        self.index.datasets.get(path).map(|e| e.shape.as_slice())
    }

    fn flush_index(&mut self) -> Result<()> {
        let raw = self
            .index
            .to_bytes()
            .map_err(|e| Error::Format(format!("unserializable dataset index: {e}")))?;
        let (header, payload) = encode_block(&raw);

        self.file.seek(SeekFrom::Start(self.data_end))?;
        header.write(&mut self.file)?;
        self.file.write_all(&payload)?;
        let end = self.file.stream_position()?;

        self.superblock.index_offset = self.data_end;
        self.superblock.index_size = end - self.data_end;
        self.file.seek(SeekFrom::Start(0))?;
        self.superblock.write(&mut self.file)?;

        // A previous, longer index may extend past the new one.
        self.file.set_len(end)?;
        self.file.flush()?;
        self.file.sync_all()?;
        self.finalized = true;
        Ok(())
    }

    /// Flush the index, patch the superblock, and release the handle.
    pub fn close(mut self) -> Result<()> {
        if self.mode.writable() && !self.finalized {
            self.flush_index()?;
        }
        debug!(path = %self.path.display(), "container closed");
        Ok(())
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if self.mode.writable() && !self.finalized {
            if let Err(err) = self.flush_index() {
                warn!(path = %self.path.display(), %err, "index flush failed while dropping open container");
            }
        }
    }
}
