//! Record format contract and registry.
//!
//! A [`FileFormat`] reads and writes [`Record`]s over raw byte streams.
//! Provided entry points adapt named files and in-memory strings to the
//! stream contract and manage the per-instance diagnostic log.  Concrete
//! formats are registered by identifier in a [`FormatRegistry`], which hands
//! out fresh instances on demand.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::Record;

pub mod json;

// ── FormatLog ─────────────────────────────────────────────────────────────────

/// Per-instance diagnostic state embedded by every format implementation.
///
/// The log reflects exactly the diagnostics of the most recent read/write
/// call since the last [`FormatLog::clear`].
#[derive(Debug, Clone, Default)]
pub struct FormatLog {
    error: String,
    file_name: String,
}

impl FormatLog {
    /// Append a diagnostic, optionally followed by a newline.  Existing
    /// content is kept.
    pub fn append_error(&mut self, text: &str, newline: bool) {
        self.error.push_str(text);
        if newline {
            self.error.push('\n');
        }
    }

    pub fn set_file_name(&mut self, name: &str) {
        self.file_name = name.to_owned();
    }

    /// Accumulated errors and warnings; empty when the last call succeeded.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Source path of the last file operation; empty for stream and string
    /// operations.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn clear(&mut self) {
        self.error.clear();
        self.file_name.clear();
    }
}

// ── FileFormat ────────────────────────────────────────────────────────────────

/// Contract implemented by every concrete record format.
///
/// `read` and `write` must append a non-empty diagnostic to the log before
/// returning any error, and must not panic on malformed input.  The provided
/// file/string entry points clear the log on entry, so each call's
/// diagnostics stand alone; direct `read`/`write` calls accumulate until
/// [`FileFormat::clear`].
pub trait FileFormat {
    /// Consume the stream and populate `record`.
    fn read(&mut self, input: &mut dyn Read, record: &mut Record) -> Result<()>;

    /// Serialize `record` to the stream.
    fn write(&mut self, output: &mut dyn Write, record: &Record) -> Result<()>;

    fn log(&self) -> &FormatLog;
    fn log_mut(&mut self) -> &mut FormatLog;

    /// Fresh, independently stateful instance of the same concrete format.
    /// Ownership passes to the caller.
    fn new_instance(&self) -> Box<dyn FileFormat>;

    /// Short identifier used to retrieve the format programmatically.
    /// Expected unique among registered formats; the registry enforces this.
    fn identifier(&self) -> &'static str;

    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Description of the format, with any relevant help text.
    fn description(&self) -> &'static str;

    /// URL of the format specification, or the most relevant page otherwise.
    fn specification_url(&self) -> &'static str;

    /// Supported file extensions, lower case, without the dot.  Advisory
    /// metadata only; no extension is mandated anywhere.
    fn file_extensions(&self) -> Vec<&'static str>;

    /// Supported MIME types, lower case.
    fn mime_types(&self) -> Vec<&'static str>;

    // ── Provided entry points ────────────────────────────────────────────────

    /// Open `path` for buffered binary input, record it as the source file
    /// name, and delegate to [`FileFormat::read`].  The handle is released
    /// regardless of outcome.
    fn read_file(&mut self, path: &Path, record: &mut Record) -> Result<()> {
        self.log_mut().clear();
        self.log_mut().set_file_name(&path.display().to_string());
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                self.log_mut().append_error(
                    &format!("unable to open '{}' for reading: {err}", path.display()),
                    true,
                );
                return Err(err.into());
            }
        };
        let mut reader = BufReader::new(file);
        self.read(&mut reader, record)
    }

    /// Symmetric to [`FileFormat::read_file`] for output.
    fn write_file(&mut self, path: &Path, record: &Record) -> Result<()> {
        self.log_mut().clear();
        self.log_mut().set_file_name(&path.display().to_string());
        let file = match File::create(path) {
            Ok(file) => file,
            Err(err) => {
                self.log_mut().append_error(
                    &format!("unable to open '{}' for writing: {err}", path.display()),
                    true,
                );
                return Err(err.into());
            }
        };
        let mut writer = BufWriter::new(file);
        self.write(&mut writer, record)?;
        if let Err(err) = writer.flush() {
            self.log_mut()
                .append_error(&format!("unable to flush '{}': {err}", path.display()), true);
            return Err(err.into());
        }
        Ok(())
    }

    /// Adapt an in-memory string to the stream contract.
    fn read_string(&mut self, text: &str, record: &mut Record) -> Result<()> {
        self.log_mut().clear();
        let mut cursor = Cursor::new(text.as_bytes());
        self.read(&mut cursor, record)
    }

    /// Serialize `record` into `buffer`, replacing its content.
    fn write_string(&mut self, buffer: &mut String, record: &Record) -> Result<()> {
        self.log_mut().clear();
        let mut bytes: Vec<u8> = Vec::new();
        self.write(&mut bytes, record)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::Format(format!("format produced non-UTF-8 output: {e}")))?;
        buffer.clear();
        buffer.push_str(&text);
        Ok(())
    }

    /// Reset the error log and source file name.  Safe to call at any time.
    fn clear(&mut self) {
        self.log_mut().clear();
    }

    /// Diagnostics from the most recent read/write since the last clear.
    fn error(&self) -> &str {
        self.log().error()
    }

    fn file_name(&self) -> &str {
        self.log().file_name()
    }
}

// ── FormatRegistry ────────────────────────────────────────────────────────────

/// Maps identifiers to format prototypes.  Lookup hands out fresh instances
/// via [`FileFormat::new_instance`]; the registered prototype itself is never
/// exposed.
#[derive(Default)]
pub struct FormatRegistry {
    prototypes: BTreeMap<String, Box<dyn FileFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype.  Duplicate identifiers are rejected.
    pub fn register(&mut self, format: Box<dyn FileFormat>) -> Result<()> {
        let id = format.identifier().to_owned();
        if self.prototypes.contains_key(&id) {
            return Err(Error::State(format!("format identifier '{id}' is already registered")));
        }
        self.prototypes.insert(id, format);
        Ok(())
    }

    pub fn create(&self, identifier: &str) -> Option<Box<dyn FileFormat>> {
        self.prototypes.get(identifier).map(|p| p.new_instance())
    }

    /// First registered format claiming the extension (case-insensitive).
    pub fn create_for_extension(&self, extension: &str) -> Option<Box<dyn FileFormat>> {
        let ext = extension.to_lowercase();
        self.prototypes
            .values()
            .find(|p| p.file_extensions().contains(&ext.as_str()))
            .map(|p| p.new_instance())
    }

    /// First registered format claiming the MIME type (case-insensitive).
    pub fn create_for_mime_type(&self, mime: &str) -> Option<Box<dyn FileFormat>> {
        let mime = mime.to_lowercase();
        self.prototypes
            .values()
            .find(|p| p.mime_types().contains(&mime.as_str()))
            .map(|p| p.new_instance())
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        self.prototypes.keys().cloned().collect()
    }
}
