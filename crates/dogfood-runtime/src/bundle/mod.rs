//! Bundle format, loading, and writing
//!
//! Handles the script payload appended to the dogfood-host binary:
//! - **format**: trailer and module header grammar
//! - **reader**: bounded, pull-based access to one module body
//! - **loader**: locate the payload, register libraries, compile the entry
//! - **writer**: append modules and a trailer to a host image

pub mod format;
pub mod loader;
pub mod reader;
pub mod writer;

pub use format::{locate_payload, ModuleHeader, PayloadSpan, Trailer, TRAILER_SIZE};
pub use loader::{
    BoundsPolicy, BundleLoader, LoadedBundle, LoaderConfig, ModuleRecord, PayloadDirectory,
};
pub use reader::{read_to_end, BodyReader, ModuleSource};
pub use writer::{BundledModule, PayloadBuilder};
