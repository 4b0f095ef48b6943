use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Absolute offset of the dataset's block header.
    pub offset: u64,
    /// One extent per dimension; the product equals the value count.
    pub shape: Vec<u64>,
}

/// In-memory dataset index, serialized as JSON into the container's trailing
/// block.  Keyed by normalized path, so iteration is lexicographic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub datasets: BTreeMap<String, DatasetEntry>,
}

impl DatasetIndex {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
