//! dogfood-host
//!
//! The executable scripts get appended to. At startup it opens its own
//! image, loads the appended modules, and runs the entry module.
//!
//! ```bash
//! # Trace the loader while the bundled program runs
//! DOGFOOD_LOG=debug ./my-app
//! ```

use std::path::PathBuf;
use std::process::exit;

use dogfood_runtime::{driver, logging};
use dogfood_runtime::{LoaderConfig, RhaiEngine};

fn main() {
    exit(run())
}

/// Everything that must be released before exiting lives in here.
fn run() -> i32 {
    logging::init("warn");

    let args: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let image = match image_path(args.first()) {
        Some(path) => path,
        None => {
            eprintln!("Dogfood error: Could not locate the executable image.");
            return driver::FAILURE_EXIT_CODE;
        }
    };
    tracing::debug!(image = %image.display(), "starting");

    let mut engine = RhaiEngine::with_args(args);
    driver::finish(driver::run_path(&image, &mut engine, LoaderConfig::from_env()))
}

/// argv[0] when it names a file, otherwise the path the OS reports.
fn image_path(arg0: Option<&String>) -> Option<PathBuf> {
    arg0.map(PathBuf::from)
        .filter(|path| path.is_file())
        .or_else(|| std::env::current_exe().ok())
}
