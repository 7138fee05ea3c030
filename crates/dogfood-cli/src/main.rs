//! dogfood
//!
//! Build tool for self-running script executables: appends script modules
//! to the `dogfood-host` binary, lists what a bundled executable carries,
//! and runs a bundle without spawning it.

mod commands;
mod manifest;
mod output;

use clap::{Parser, Subcommand};
use dogfood_runtime::bundle::BoundsPolicy;
use dogfood_runtime::{logging, LoaderConfig};
use std::path::PathBuf;

use commands::bundle::BundleArgs;
use output::{resolve_color_choice, StyledOutput};

#[derive(Parser)]
#[command(name = "dogfood")]
#[command(about = "Bundle script modules into a self-running executable", long_about = None)]
#[command(version)]
struct Cli {
    /// When to use colors: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append modules to a host executable
    Bundle {
        /// Manifest to read when no modules are listed (default: ./dogfood.toml)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Host executable (default: dogfood-host next to this binary)
        #[arg(long)]
        host: Option<PathBuf>,
        /// Output executable
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Module files as `path` or `name=path`; the first is the entry
        modules: Vec<String>,
    },

    /// List the modules carried by a bundled executable
    Inspect {
        /// Bundled executable
        image: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Read past module bodies that overrun the payload
        #[arg(long)]
        lenient: bool,
    },

    /// Run a bundled executable's modules in this process
    Run {
        /// Bundled executable
        image: PathBuf,
        /// Read past module bodies that overrun the payload
        #[arg(long)]
        lenient: bool,
        /// Arguments exposed to the program as ARGS
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn loader_config(lenient: bool) -> LoaderConfig {
    let mut config = LoaderConfig::from_env();
    if lenient {
        config.bounds = BoundsPolicy::Lenient;
    }
    config
}

fn main() -> anyhow::Result<()> {
    logging::init("warn");
    let cli = Cli::parse();
    let mut out = StyledOutput::new(resolve_color_choice(Some(&cli.color)));

    match cli.command {
        Commands::Bundle {
            manifest,
            host,
            output,
            modules,
        } => {
            commands::bundle::execute(
                BundleArgs {
                    manifest,
                    host,
                    output,
                    modules,
                },
                &mut out,
            )?;
        }

        Commands::Inspect {
            image,
            json,
            lenient,
        } => {
            commands::inspect::execute(&image, loader_config(lenient), json, &mut out)?;
        }

        Commands::Run {
            image,
            lenient,
            args,
        } => {
            let code = commands::run::execute(&image, loader_config(lenient), args);
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}
