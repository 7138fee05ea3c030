//! `dogfood run`: Run a bundled executable's modules in-process.

use dogfood_runtime::{driver, LoaderConfig, RhaiEngine};
use std::path::Path;

/// Returns the process exit code. Errors are already reported on stderr.
pub fn execute(image: &Path, config: LoaderConfig, args: Vec<String>) -> i32 {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(image.display().to_string());
    argv.extend(args);

    let mut engine = RhaiEngine::with_args(argv);
    driver::finish(driver::run_path(image, &mut engine, config))
}
