//! Minimal structured record exchanged through [`crate::format::FileFormat`].
//!
//! The record carries no domain schema; it is an ordered key/value container
//! that formats populate on read and inspect on write.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matrix::DenseMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Text(String),
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(DenseMatrix),
    /// Path of a dataset externalized into a [`crate::store::DataStore`]
    /// instead of being inlined.
    External(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entries: BTreeMap<String, RecordValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RecordValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RecordValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
