pub mod block;
pub mod container;
pub mod error;
pub mod format;
pub mod index;
pub mod matrix;
pub mod record;
pub mod store;
pub mod superblock;

pub use container::OpenMode;
pub use error::{Error, Result};
pub use format::json::JsonFormat;
pub use format::{FileFormat, FormatLog, FormatRegistry};
pub use matrix::DenseMatrix;
pub use record::{Record, RecordValue};
pub use store::{DataStore, DEFAULT_THRESHOLD};
