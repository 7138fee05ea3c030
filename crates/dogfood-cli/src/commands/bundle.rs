//! `dogfood bundle`: Append script modules to a host executable.

use anyhow::{bail, Context};
use dogfood_runtime::bundle::{locate_payload, TRAILER_SIZE};
use dogfood_runtime::PayloadBuilder;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::manifest::{BundleManifest, BundlePlan, ModuleSpec, MANIFEST_FILE};
use crate::output::StyledOutput;

/// Name of the host binary looked up next to `dogfood` when no host is given.
const HOST_BINARY: &str = "dogfood-host";

pub struct BundleArgs {
    pub manifest: Option<PathBuf>,
    pub host: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub modules: Vec<String>,
}

pub fn execute(args: BundleArgs, out: &mut StyledOutput) -> anyhow::Result<()> {
    let plan = plan(args)?;
    let host = match &plan.host {
        Some(host) => host.clone(),
        None => default_host()?,
    };

    let written = write_bundle(&plan, &host)?;
    out.status(
        "Bundled",
        &format!(
            "{} ({} modules, {} bytes)",
            plan.output.display(),
            plan.libraries.len() + 1,
            written
        ),
    );
    out.flush();
    Ok(())
}

/// Modules from the command line when given, otherwise from the manifest.
fn plan(args: BundleArgs) -> anyhow::Result<BundlePlan> {
    if args.modules.is_empty() {
        let path = args.manifest.unwrap_or_else(|| PathBuf::from(MANIFEST_FILE));
        let manifest = BundleManifest::from_file(&path)
            .with_context(|| format!("Cannot load {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut plan = manifest.resolve(base)?;
        if let Some(host) = args.host {
            plan.host = Some(host);
        }
        if let Some(output) = args.output {
            plan.output = output;
        }
        return Ok(plan);
    }

    if args.manifest.is_some() {
        bail!("Pass either --manifest or module files, not both");
    }

    let mut modules = args
        .modules
        .iter()
        .map(|arg| ModuleSpec::parse_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let entry = modules.remove(0);
    let output = args
        .output
        .context("--output is required when modules are listed on the command line")?;

    Ok(BundlePlan {
        host: args.host,
        output,
        entry,
        libraries: modules,
    })
}

/// Write `host ‖ payload ‖ trailer` to `plan.output`. Returns the image size.
pub fn write_bundle(plan: &BundlePlan, host: &Path) -> anyhow::Result<u64> {
    let mut builder = PayloadBuilder::new(plan.entry.name.clone(), read_module(&plan.entry)?)?;
    for module in &plan.libraries {
        builder.library(module.name.clone(), read_module(module)?)?;
    }

    let host_bytes = fs::read(host)
        .with_context(|| format!("Cannot read host executable {}", host.display()))?;
    if locate_payload(&mut Cursor::new(&host_bytes)).is_ok() {
        bail!("{} already carries a payload", host.display());
    }

    let mut image =
        Vec::with_capacity(host_bytes.len() + builder.payload_len() as usize + TRAILER_SIZE);
    let written = builder.write_image(&host_bytes, &mut image)?;
    tracing::debug!(
        host = %host.display(),
        payload = builder.payload_len(),
        libraries = builder.libraries().len(),
        "image assembled"
    );

    if let Some(parent) = plan.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&plan.output, &image)
        .with_context(|| format!("Cannot write {}", plan.output.display()))?;
    make_executable(&plan.output)?;

    Ok(written)
}

fn read_module(module: &ModuleSpec) -> anyhow::Result<Vec<u8>> {
    fs::read(&module.path).with_context(|| {
        format!(
            "Cannot read module '{}' from {}",
            module.name,
            module.path.display()
        )
    })
}

fn default_host() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate the dogfood executable")?;
    let host = exe.with_file_name(format!("{}{}", HOST_BINARY, std::env::consts::EXE_SUFFIX));
    if !host.is_file() {
        bail!("No host executable at {}; pass --host", host.display());
    }
    Ok(host)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
