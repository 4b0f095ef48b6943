use std::io;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Callers must not trust output values after an `Err`; partially populated
/// outputs are left in an unspecified state.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed container contents, an unusable dataset path, or an
    /// unparseable record payload.
    #[error("format error: {0}")]
    Format(String),
    #[error("dataset not found: {0}")]
    NotFound(String),
    /// Operation issued in the wrong store state: closed, already open, or
    /// read-only.
    #[error("invalid state: {0}")]
    State(String),
    /// A rank-2 read was issued against a dataset of a different rank.
    #[error("expected a rank-2 dataset, found rank {0}")]
    ShapeMismatch(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
