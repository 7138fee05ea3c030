//! Streaming body reader
//!
//! Hands a module body to the engine in bounded chunks so that large
//! modules never have to sit in memory as one buffer on the loader side.

use std::io::{self, Read};

use crate::error::LoadError;

/// Default chunk capacity used by the loader.
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

/// A pull-based source of one module's body bytes.
///
/// This is what an engine sees when asked to compile a module.
pub trait ModuleSource {
    /// Name of the module being read.
    fn module_name(&self) -> &str;

    /// Body length declared in the module header.
    fn declared_len(&self) -> u64;

    /// Next chunk of the body, or `None` once the declared length has been
    /// delivered. The slice is only valid until the next call.
    fn next_chunk(&mut self) -> Result<Option<&[u8]>, LoadError>;
}

/// Reads exactly `declared` bytes of one module from the shared file handle.
pub struct BodyReader<'a, R> {
    reader: &'a mut R,
    module: &'a str,
    declared: u64,
    remaining: u64,
    buf: &'a mut Vec<u8>,
    capacity: usize,
}

impl<'a, R: Read> BodyReader<'a, R> {
    /// Bind a reader to one module body.
    ///
    /// `buf` is scratch space reused across pulls; at most `capacity`
    /// bytes of it are used.
    pub fn new(
        reader: &'a mut R,
        module: &'a str,
        declared: u64,
        buf: &'a mut Vec<u8>,
        capacity: usize,
    ) -> Self {
        Self {
            reader,
            module,
            declared,
            remaining: declared,
            buf,
            capacity: capacity.max(1),
        }
    }

    /// Bytes of the body not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.declared - self.remaining
    }

    fn short_read(&self, read: u64) -> LoadError {
        LoadError::ShortRead {
            module: self.module.to_string(),
            expected: self.declared,
            read,
        }
    }
}

impl<R: Read> ModuleSource for BodyReader<'_, R> {
    fn module_name(&self) -> &str {
        self.module
    }

    fn declared_len(&self) -> u64 {
        self.declared
    }

    fn next_chunk(&mut self) -> Result<Option<&[u8]>, LoadError> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let want = self.remaining.min(self.capacity as u64) as usize;
        self.buf.resize(want, 0);

        let mut filled = 0;
        while filled < want {
            match self.reader.read(&mut self.buf[filled..want]) {
                Ok(0) => return Err(self.short_read(self.consumed() + filled as u64)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.remaining -= want as u64;
        Ok(Some(&self.buf[..want]))
    }
}

/// Drain a source into one buffer.
///
/// For engines that can only compile a complete body.
pub fn read_to_end(source: &mut dyn ModuleSource) -> Result<Vec<u8>, LoadError> {
    let mut body = Vec::with_capacity(source.declared_len().min(1 << 20) as usize);
    while let Some(chunk) = source.next_chunk()? {
        body.extend_from_slice(chunk);
    }
    Ok(body)
}
