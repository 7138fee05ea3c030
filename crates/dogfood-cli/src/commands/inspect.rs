//! `dogfood inspect`: List the modules carried by a bundled executable.

use anyhow::Context;
use dogfood_runtime::bundle::{ModuleRecord, PayloadDirectory};
use dogfood_runtime::{BundleLoader, LoaderConfig};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::output::StyledOutput;

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    image: String,
    payload_offset: u64,
    payload_end: u64,
    modules: Vec<ModuleReport<'a>>,
}

#[derive(Debug, Serialize)]
struct ModuleReport<'a> {
    role: &'static str,
    name: &'a str,
    header_offset: u64,
    body_offset: u64,
    size: u64,
}

impl<'a> ModuleReport<'a> {
    fn new(role: &'static str, record: &'a ModuleRecord) -> Self {
        Self {
            role,
            name: &record.name,
            header_offset: record.header_offset,
            body_offset: record.body_offset,
            size: record.size,
        }
    }
}

pub fn execute(
    image: &Path,
    config: LoaderConfig,
    json: bool,
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let directory = scan(image, config)?;
    let report = report(image, &directory);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    out.heading(&report.image);
    out.field(
        "Payload",
        &format!(
            "{:#x}..{:#x} ({} bytes)",
            report.payload_offset,
            report.payload_end,
            directory.span.len()
        ),
    );
    out.field("Modules", &report.modules.len().to_string());
    for module in &report.modules {
        out.module_row(module.role, module.name, module.body_offset, module.size);
    }
    out.flush();
    Ok(())
}

fn scan(image: &Path, config: LoaderConfig) -> anyhow::Result<PayloadDirectory> {
    let file = File::open(image).with_context(|| format!("Cannot open {}", image.display()))?;
    BundleLoader::with_config(BufReader::new(file), config)
        .scan()
        .with_context(|| format!("{} is not a bundled executable", image.display()))
}

fn report<'a>(image: &Path, directory: &'a PayloadDirectory) -> InspectReport<'a> {
    let mut modules = vec![ModuleReport::new("entry", &directory.entry)];
    modules.extend(
        directory
            .libraries
            .iter()
            .map(|record| ModuleReport::new("library", record)),
    );

    InspectReport {
        image: image.display().to_string(),
        payload_offset: directory.span.start,
        payload_end: directory.span.end,
        modules,
    }
}
