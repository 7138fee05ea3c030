//! Execution driver
//!
//! Loads a bundle image, runs its entry module once, and turns the outcome
//! into a process exit code.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;

use tracing::debug;

use crate::bundle::{BundleLoader, LoaderConfig};
use crate::engine::ScriptEngine;
use crate::error::LoadError;

/// Exit code for every loader or runtime failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Load the bundle in `reader` into `engine` and run the entry module.
///
/// The image handle is closed before the entry module starts.
pub fn run_image<R, E>(reader: R, engine: &mut E, config: LoaderConfig) -> Result<i32, LoadError>
where
    R: Read + Seek,
    E: ScriptEngine,
{
    let bundle = BundleLoader::with_config(reader, config).load(engine)?;
    let entry_name = bundle.directory.entry.name;

    let result = engine.execute(bundle.entry)?;
    debug!(module = %entry_name, ?result, "entry module finished");

    Ok(exit_code(result))
}

/// Open the image at `path` and run it.
pub fn run_path<E: ScriptEngine>(
    path: &Path,
    engine: &mut E,
    config: LoaderConfig,
) -> Result<i32, LoadError> {
    let file = File::open(path)?;
    run_image(BufReader::new(file), engine, config)
}

/// Exit code for the entry module's result: numbers are truncated toward
/// zero, anything else is success.
pub fn exit_code(result: Option<f64>) -> i32 {
    result.map_or(0, |value| value as i32)
}

/// Print `err` the way the host reports it and return the failure code.
///
/// Errors raised by the bundled program are printed as-is; loader errors
/// get a `Dogfood error:` prefix.
pub fn report<W: Write>(err: &LoadError, out: &mut W) -> i32 {
    let _ = if err.is_runtime() {
        writeln!(out, "{}", err)
    } else {
        writeln!(out, "Dogfood error: {}", err)
    };
    FAILURE_EXIT_CODE
}

/// Map a run result to the process exit code, reporting failures on stderr.
pub fn finish(result: Result<i32, LoadError>) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => report(&err, &mut io::stderr().lock()),
    }
}
