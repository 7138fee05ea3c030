//! Payload framing format
//!
//! Defines the records appended to the host binary.
//!
//! ```text
//! ┌─────────────────────────┐
//! │  host binary (unchanged)│  ← normal dogfood-host executable
//! ├─────────────────────────┤  ← payload_offset
//! │  Entry header + body    │  ← first record, executed last
//! ├─────────────────────────┤
//! │  Library header + body  │  ← zero or more, registered in order
//! ├─────────────────────────┤  ← payload end
//! │  Trailer                │  ← fixed-size, at very end of file
//! └─────────────────────────┘
//! ```
//!
//! Both markers are plain text so a bundle can be produced with nothing
//! more than `cat` and `printf`:
//!
//! - trailer: `"\r\n-- dogfood " HHHHHHHH "\r\n"` (payload offset)
//! - header:  `"\r\n-- " name " " HHHHHHHH "\r\n"` (body length)

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{FormatError, LoadError};

/// Literal text in front of the payload offset.
pub const TRAILER_PREFIX: &[u8] = b"\r\n-- dogfood ";

/// Literal text in front of every module name.
pub const HEADER_PREFIX: &[u8] = b"\r\n-- ";

/// Terminator shared by the trailer and every header.
pub const LINE_END: &[u8] = b"\r\n";

/// Number of hex digits in every size and offset field.
pub const HEX_DIGITS: usize = 8;

/// Size of the trailer in bytes.
pub const TRAILER_SIZE: usize = TRAILER_PREFIX.len() + HEX_DIGITS + LINE_END.len();

/// Longest module name a header may carry.
pub const MAX_NAME_LEN: usize = 127;

/// Fixed-size trailer at the very end of the bundled binary.
///
/// To detect whether an image carries a payload, read the last
/// `TRAILER_SIZE` bytes and check the literal prefix and suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Offset from the start of the file to the start of the payload.
    /// This equals the size of the host binary.
    pub payload_offset: u32,
}

/// The byte range `[start, end)` of the image holding module records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSpan {
    pub start: u64,
    pub end: u64,
}

impl PayloadSpan {
    /// Number of payload bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A decoded module header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    /// Module name as registered with the engine.
    pub name: String,

    /// Declared body length in bytes.
    pub size: u32,
}

impl Trailer {
    /// Read a trailer from raw bytes (must be exactly TRAILER_SIZE bytes).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TRAILER_SIZE {
            return None;
        }

        let (prefix, rest) = bytes.split_at(TRAILER_PREFIX.len());
        let (digits, suffix) = rest.split_at(HEX_DIGITS);
        if prefix != TRAILER_PREFIX || suffix != LINE_END {
            return None;
        }

        parse_hex(digits).map(|payload_offset| Trailer { payload_offset })
    }

    /// Write the trailer to a byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TRAILER_SIZE);
        bytes.extend_from_slice(TRAILER_PREFIX);
        bytes.extend_from_slice(&encode_hex(self.payload_offset));
        bytes.extend_from_slice(LINE_END);
        bytes
    }

    /// Write the trailer to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

impl ModuleHeader {
    /// Create a header, checking the name against the header grammar.
    pub fn new(name: impl Into<String>, size: u32) -> Result<Self, &'static str> {
        let name = name.into();
        validate_module_name(&name)?;
        Ok(Self { name, size })
    }

    /// Number of bytes this header occupies in the payload.
    pub fn encoded_len(&self) -> u64 {
        (HEADER_PREFIX.len() + self.name.len() + 1 + HEX_DIGITS + LINE_END.len()) as u64
    }

    /// Write the header to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(HEADER_PREFIX)?;
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b" ")?;
        writer.write_all(&encode_hex(self.size))?;
        writer.write_all(LINE_END)
    }

    /// Decode one header starting at the reader's current position.
    ///
    /// `offset` is that position in the image and is only used for
    /// diagnostics. On success the reader sits on the first body byte.
    pub fn read_from<R: Read>(reader: &mut R, offset: u64) -> Result<Self, LoadError> {
        let missing = || LoadError::from(FormatError::MissingHeader { offset });

        let mut prefix = [0u8; HEADER_PREFIX.len()];
        if !fill(reader, &mut prefix)? || prefix != HEADER_PREFIX {
            return Err(missing());
        }

        let mut name = Vec::with_capacity(16);
        loop {
            match read_byte(reader)? {
                Some(b' ') if !name.is_empty() => break,
                Some(byte) if !byte.is_ascii_whitespace() && name.len() < MAX_NAME_LEN => {
                    name.push(byte)
                }
                _ => return Err(missing()),
            }
        }
        let name = String::from_utf8(name).map_err(|_| missing())?;

        let malformed = |reason| FormatError::MalformedHeader {
            module: name.clone(),
            reason,
        };

        let mut tail = [0u8; HEX_DIGITS + LINE_END.len()];
        if !fill(reader, &mut tail)? {
            return Err(malformed("header is truncated").into());
        }
        let (digits, line_end) = tail.split_at(HEX_DIGITS);
        let size = parse_hex(digits).ok_or_else(|| malformed("size is not 8 hex digits"))?;
        if line_end != LINE_END {
            return Err(malformed("header does not end with CRLF").into());
        }

        Ok(Self { name, size })
    }
}

/// Find the trailer at the end of `reader` and return the payload range.
///
/// Leaves the reader at end of file; the caller seeks to `span.start`.
pub fn locate_payload<R: Read + Seek>(reader: &mut R) -> Result<PayloadSpan, LoadError> {
    let end = reader.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;

    let mut bytes = [0u8; TRAILER_SIZE];
    reader.read_exact(&mut bytes)?;

    let trailer = Trailer::from_bytes(&bytes).ok_or(FormatError::MissingTrailer)?;
    let start = u64::from(trailer.payload_offset);
    if start > end {
        return Err(FormatError::PayloadOutOfRange { offset: start, end }.into());
    }

    Ok(PayloadSpan { start, end })
}

/// Check a module name against the header grammar.
pub fn validate_module_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("module name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("module name is longer than 127 bytes");
    }
    if name.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err("module name contains whitespace");
    }
    Ok(())
}

/// Parse exactly eight hex digits (either case).
fn parse_hex(digits: &[u8]) -> Option<u32> {
    if digits.len() != HEX_DIGITS || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, 16).ok()
}

fn encode_hex(value: u32) -> [u8; HEX_DIGITS] {
    let mut out = [0u8; HEX_DIGITS];
    out.copy_from_slice(format!("{:08X}", value).as_bytes());
    out
}

/// Read one byte, `None` at end of file.
fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    Ok(fill(reader, &mut byte)?.then_some(byte[0]))
}

/// Fill `buf` completely. Returns `false` if the file ends first.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
