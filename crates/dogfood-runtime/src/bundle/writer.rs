//! Bundle writer
//!
//! Produces the records the loader reads back: the host image unchanged,
//! then the entry record, the library records in order, and the trailer.

use std::io::{Seek, SeekFrom, Write};

use super::format::{ModuleHeader, Trailer};
use crate::error::WriteError;

/// One module to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledModule {
    pub name: String,
    pub body: Vec<u8>,
}

impl BundledModule {
    pub fn new(name: impl Into<String>, body: Vec<u8>) -> Result<Self, WriteError> {
        let name = name.into();
        let size = fit_hex("Module body", body.len() as u64)?;
        ModuleHeader::new(name.as_str(), size)
            .map_err(|reason| WriteError::InvalidName { name: name.clone(), reason })?;
        Ok(Self { name, body })
    }

    fn header(&self) -> ModuleHeader {
        ModuleHeader {
            name: self.name.clone(),
            size: self.body.len() as u32,
        }
    }

    /// Header plus body length.
    pub fn record_len(&self) -> u64 {
        self.header().encoded_len() + self.body.len() as u64
    }
}

/// Collects modules and writes them as a payload.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    entry: BundledModule,
    libraries: Vec<BundledModule>,
}

impl PayloadBuilder {
    /// Start a payload with its entry module. The body must not be empty.
    pub fn new(name: impl Into<String>, body: Vec<u8>) -> Result<Self, WriteError> {
        let entry = BundledModule::new(name, body)?;
        if entry.body.is_empty() {
            return Err(WriteError::EmptyEntry { name: entry.name });
        }
        Ok(Self {
            entry,
            libraries: Vec::new(),
        })
    }

    /// Append a library module. Repeating a name is allowed; the loader
    /// keeps the last one.
    pub fn library(
        &mut self,
        name: impl Into<String>,
        body: Vec<u8>,
    ) -> Result<&mut Self, WriteError> {
        self.libraries.push(BundledModule::new(name, body)?);
        Ok(self)
    }

    pub fn entry(&self) -> &BundledModule {
        &self.entry
    }

    pub fn libraries(&self) -> &[BundledModule] {
        &self.libraries
    }

    /// Size of the payload without the trailer.
    pub fn payload_len(&self) -> u64 {
        self.modules().map(BundledModule::record_len).sum()
    }

    /// Write the records and the trailer for a payload starting at
    /// `payload_offset`. Returns the number of bytes written.
    pub fn write_payload<W: Write>(
        &self,
        writer: &mut W,
        payload_offset: u64,
    ) -> Result<u64, WriteError> {
        let trailer = Trailer {
            payload_offset: fit_hex("Host image", payload_offset)?,
        };

        for module in self.modules() {
            module.header().write_to(writer)?;
            writer.write_all(&module.body)?;
        }
        trailer.write_to(writer)?;

        Ok(self.payload_len() + trailer.to_bytes().len() as u64)
    }

    /// Write `host` followed by the payload.
    pub fn write_image<W: Write>(&self, host: &[u8], writer: &mut W) -> Result<u64, WriteError> {
        writer.write_all(host)?;
        let written = self.write_payload(writer, host.len() as u64)?;
        Ok(host.len() as u64 + written)
    }

    /// Append the payload to an existing image, e.g. a copied host binary.
    pub fn append_to<W: Write + Seek>(&self, image: &mut W) -> Result<u64, WriteError> {
        let offset = image.seek(SeekFrom::End(0))?;
        self.write_payload(image, offset)
    }

    fn modules(&self) -> impl Iterator<Item = &BundledModule> {
        std::iter::once(&self.entry).chain(self.libraries.iter())
    }
}

fn fit_hex(what: &'static str, value: u64) -> Result<u32, WriteError> {
    u32::try_from(value).map_err(|_| WriteError::TooLarge { what, value })
}
