//! Dogfood Runtime
//!
//! Runs script programs that were appended to the `dogfood-host` executable.
//! The host finds the payload through a fixed-size trailer, registers every
//! library module with the script engine, then compiles and runs the entry
//! module.

pub mod bundle;
pub mod driver;
pub mod engine;
pub mod error;
pub mod logging;
pub mod rhai_engine;

pub use bundle::{BundleLoader, LoaderConfig, PayloadBuilder};
pub use driver::{run_image, run_path};
pub use engine::ScriptEngine;
pub use error::{FormatError, LoadError, WriteError};
pub use rhai_engine::RhaiEngine;
