//! Bundle loader
//!
//! Walks the payload appended to an image and feeds every module to a
//! [`ScriptEngine`]:
//! 1. Read trailer from end of image
//! 2. Read the entry header, remember where its body starts, skip the body
//! 3. Compile and register every library module in payload order
//! 4. Seek back to the entry body and compile it
//!
//! The entry module is first in the payload but compiled last, so that
//! everything it imports is already registered.

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace, warn};

use super::format::{locate_payload, ModuleHeader, PayloadSpan};
use super::reader::{BodyReader, DEFAULT_CHUNK_CAPACITY};
use crate::engine::ScriptEngine;
use crate::error::{FormatError, LoadError};

/// Environment variable overriding [`LoaderConfig::chunk_capacity`].
pub const CHUNK_SIZE_VAR: &str = "DOGFOOD_CHUNK_SIZE";

/// Environment variable selecting [`BoundsPolicy::Lenient`] when set to `1`.
pub const LENIENT_BOUNDS_VAR: &str = "DOGFOOD_LENIENT_BOUNDS";

/// What to do with a module whose body runs past the end of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// Reject the bundle with [`FormatError::Overrun`].
    #[default]
    Strict,
    /// Read on regardless; a body cut short by end of file is still a
    /// short read.
    Lenient,
}

/// Loader tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Largest chunk handed to the engine per pull.
    pub chunk_capacity: usize,

    /// Overrun handling.
    pub bounds: BoundsPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            bounds: BoundsPolicy::Strict,
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden by `DOGFOOD_CHUNK_SIZE` and `DOGFOOD_LENIENT_BOUNDS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(CHUNK_SIZE_VAR) {
            match value.trim().parse::<usize>() {
                Ok(size) => config.chunk_capacity = size.max(1),
                Err(_) => warn!(value = %value, "ignoring invalid {}", CHUNK_SIZE_VAR),
            }
        }

        if matches!(lookup(LENIENT_BOUNDS_VAR).as_deref(), Some("1") | Some("true")) {
            config.bounds = BoundsPolicy::Lenient;
        }

        config
    }
}

/// Where one module record sits in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Module name from the header.
    pub name: String,

    /// Offset of the first header byte.
    pub header_offset: u64,

    /// Offset of the first body byte.
    pub body_offset: u64,

    /// Declared body length.
    pub size: u64,
}

impl ModuleRecord {
    /// Offset one past the last body byte.
    pub fn end(&self) -> u64 {
        self.body_offset + self.size
    }
}

/// Every record of a payload, in payload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDirectory {
    pub span: PayloadSpan,
    pub entry: ModuleRecord,
    pub libraries: Vec<ModuleRecord>,
}

impl PayloadDirectory {
    /// Entry record followed by the library records.
    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        std::iter::once(&self.entry).chain(self.libraries.iter())
    }
}

/// The result of a successful load: the compiled entry module, ready to run.
pub struct LoadedBundle<U> {
    pub directory: PayloadDirectory,
    pub entry: U,
}

/// Reads a bundle image through one seekable handle.
pub struct BundleLoader<R> {
    reader: R,
    config: LoaderConfig,
    chunk: Vec<u8>,
}

impl<R: Read + Seek> BundleLoader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, LoaderConfig::default())
    }

    pub fn with_config(reader: R, config: LoaderConfig) -> Self {
        Self {
            reader,
            config,
            chunk: Vec::new(),
        }
    }

    /// Give back the underlying handle.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Register every library module with `engine`, then compile the entry
    /// module.
    pub fn load<E: ScriptEngine>(
        &mut self,
        engine: &mut E,
    ) -> Result<LoadedBundle<E::Unit>, LoadError> {
        let span = self.locate()?;
        let entry = self.read_entry(span)?;

        // The entry body is compiled last; remember it and move on.
        let entry_body_pos = entry.body_offset;
        self.reader.seek(SeekFrom::Start(entry.end()))?;
        trace!(module = %entry.name, size = entry.size, "skipped entry body");

        let mut libraries = Vec::new();
        let mut cursor = entry.end();
        while cursor < span.end {
            let record = self.read_record(cursor, span)?;
            let unit = self.compile_body(engine, &record)?;
            engine.register(&record.name, unit)?;
            debug!(
                module = %record.name,
                offset = record.header_offset,
                size = record.size,
                "registered library module"
            );
            cursor = record.end();
            libraries.push(record);
        }

        self.reader.seek(SeekFrom::Start(entry_body_pos))?;
        let unit = self.compile_body(engine, &entry)?;
        debug!(module = %entry.name, libraries = libraries.len(), "compiled entry module");

        Ok(LoadedBundle {
            directory: PayloadDirectory {
                span,
                entry,
                libraries,
            },
            entry: unit,
        })
    }

    /// List the records of the payload without compiling anything.
    pub fn scan(&mut self) -> Result<PayloadDirectory, LoadError> {
        let span = self.locate()?;
        let entry = self.read_entry(span)?;

        let mut libraries = Vec::new();
        let mut cursor = entry.end();
        while cursor < span.end {
            self.reader.seek(SeekFrom::Start(cursor))?;
            let record = self.read_record(cursor, span)?;
            cursor = record.end();
            libraries.push(record);
        }

        Ok(PayloadDirectory {
            span,
            entry,
            libraries,
        })
    }

    fn locate(&mut self) -> Result<PayloadSpan, LoadError> {
        let span = locate_payload(&mut self.reader)?;
        debug!(start = span.start, end = span.end, "located payload");
        self.reader.seek(SeekFrom::Start(span.start))?;
        Ok(span)
    }

    fn read_entry(&mut self, span: PayloadSpan) -> Result<ModuleRecord, LoadError> {
        if span.is_empty() {
            return Err(FormatError::MissingHeader { offset: span.start }.into());
        }

        let entry = self.read_record(span.start, span)?;
        if entry.size == 0 {
            return Err(FormatError::EmptyEntry { module: entry.name }.into());
        }
        Ok(entry)
    }

    /// Decode the header at `offset` (the reader must already be there).
    fn read_record(&mut self, offset: u64, span: PayloadSpan) -> Result<ModuleRecord, LoadError> {
        let header = ModuleHeader::read_from(&mut self.reader, offset)?;
        let record = ModuleRecord {
            body_offset: offset + header.encoded_len(),
            size: u64::from(header.size),
            header_offset: offset,
            name: header.name,
        };
        trace!(module = %record.name, offset, size = record.size, "read module header");

        if record.end() > span.end {
            let excess = record.end() - span.end;
            match self.config.bounds {
                BoundsPolicy::Strict => {
                    return Err(FormatError::Overrun {
                        module: record.name,
                        excess,
                    }
                    .into())
                }
                BoundsPolicy::Lenient => {
                    warn!(module = %record.name, excess, "module runs past the end of the payload")
                }
            }
        }

        Ok(record)
    }

    /// Stream the body of `record` into the engine. The reader must be on
    /// the first body byte; it is left one past the last.
    fn compile_body<E: ScriptEngine>(
        &mut self,
        engine: &mut E,
        record: &ModuleRecord,
    ) -> Result<E::Unit, LoadError> {
        let mut body = BodyReader::new(
            &mut self.reader,
            &record.name,
            record.size,
            &mut self.chunk,
            self.config.chunk_capacity,
        );
        let unit = engine.compile(&record.name, &mut body)?;

        let unread = body.remaining();
        if unread > 0 {
            trace!(module = %record.name, unread, "engine left part of the body unread");
            self.reader.seek(SeekFrom::Start(record.end()))?;
        }

        Ok(unit)
    }
}
