//! JSON record format.
//!
//! Serializes a [`Record`] as a JSON document.  When attached to an open
//! [`DataStore`], arrays whose byte size exceeds the store threshold are
//! written to the store under `record/<key>` and replaced in the document by
//! an external reference; reading resolves references back through the
//! store.  Without an attached store every value is inlined.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{FileFormat, FormatLog};
use crate::matrix::DenseMatrix;
use crate::record::{Record, RecordValue};
use crate::store::DataStore;

pub struct JsonFormat {
    log: FormatLog,
    store: Option<DataStore>,
}

impl JsonFormat {
    pub fn new() -> Self {
        Self { log: FormatLog::default(), store: None }
    }

    /// Attach an open store used for externalizing oversized arrays.  The
    /// store travels with this instance only; [`FileFormat::new_instance`]
    /// starts without one.
    pub fn with_store(store: DataStore) -> Self {
        Self { log: FormatLog::default(), store: Some(store) }
    }

    /// Detach the store, e.g. to close it after a write.
    pub fn take_store(&mut self) -> Option<DataStore> {
        self.store.take()
    }

    /// Replace oversized arrays with external references, writing their
    /// payloads into the attached store.
    fn externalize(&mut self, record: &Record) -> Result<Record> {
        let Some(store) = self.store.as_mut() else {
            return Ok(record.clone());
        };
        let mut staged = Record::new();
        for (key, value) in record.iter() {
            let replaced = match value {
                RecordValue::Matrix(matrix) if store.matrix_exceeds_threshold(matrix) => {
                    let path = dataset_path(key);
                    store.write_matrix(&path, matrix)?;
                    debug!(key = key.as_str(), path = %path, "matrix externalized");
                    RecordValue::External(path)
                }
                RecordValue::Vector(values) if store.values_exceed_threshold(values) => {
                    let path = dataset_path(key);
                    store.write_dataset(&path, values, &[values.len() as u64])?;
                    debug!(key = key.as_str(), path = %path, "vector externalized");
                    RecordValue::External(path)
                }
                other => other.clone(),
            };
            staged.insert(key.clone(), replaced);
        }
        Ok(staged)
    }

    /// Resolve external references back into inline values.  Rank-2 datasets
    /// come back as matrices, everything else as flat vectors.
    fn resolve(&mut self, record: Record) -> Result<Record> {
        let mut resolved = Record::new();
        for (key, value) in record.iter() {
            let inline = match value {
                RecordValue::External(path) => {
                    let store = self.store.as_mut().ok_or_else(|| {
                        Error::Format(format!(
                            "record references external dataset '{path}' but no store is attached"
                        ))
                    })?;
                    let (values, shape) = store.read_dataset(path)?;
                    if shape.len() == 2 {
                        RecordValue::Matrix(DenseMatrix::from_vec(
                            shape[0] as usize,
                            shape[1] as usize,
                            values,
                        )?)
                    } else {
                        RecordValue::Vector(values)
                    }
                }
                other => other.clone(),
            };
            resolved.insert(key.clone(), inline);
        }
        Ok(resolved)
    }
}

fn dataset_path(key: &str) -> String {
    format!("record/{key}")
}

impl FileFormat for JsonFormat {
    fn read(&mut self, input: &mut dyn Read, record: &mut Record) -> Result<()> {
        let parsed: Record = match serde_json::from_reader(input) {
            Ok(parsed) => parsed,
            Err(err) => {
                let msg = format!("malformed JSON record: {err}");
                self.log.append_error(&msg, true);
                return Err(Error::Format(msg));
            }
        };
        match self.resolve(parsed) {
            Ok(resolved) => {
                *record = resolved;
                Ok(())
            }
            Err(err) => {
                self.log.append_error(&err.to_string(), true);
                Err(err)
            }
        }
    }

    fn write(&mut self, output: &mut dyn Write, record: &Record) -> Result<()> {
        let staged = match self.externalize(record) {
            Ok(staged) => staged,
            Err(err) => {
                self.log.append_error(&err.to_string(), true);
                return Err(err);
            }
        };
        if let Err(err) = serde_json::to_writer_pretty(&mut *output, &staged) {
            let msg = format!("unable to serialize record: {err}");
            self.log.append_error(&msg, true);
            return Err(Error::Format(msg));
        }
        Ok(())
    }

    fn log(&self) -> &FormatLog {
        &self.log
    }

    fn log_mut(&mut self) -> &mut FormatLog {
        &mut self.log
    }

    fn new_instance(&self) -> Box<dyn FileFormat> {
        Box::new(JsonFormat::new())
    }

    fn identifier(&self) -> &'static str {
        "json"
    }

    fn name(&self) -> &'static str {
        "JSON record format"
    }

    fn description(&self) -> &'static str {
        "Structured records as JSON documents; oversized arrays are \
         externalized into an attached dataset container"
    }

    fn specification_url(&self) -> &'static str {
        "https://www.json.org/"
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        vec!["json"]
    }

    fn mime_types(&self) -> Vec<&'static str> {
        vec!["application/json"]
    }
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self::new()
    }
}
