use anyhow::{Context, Result};
use pbixproj::{OpcContainer, PartInfo, describe_package};
use serde_json::json;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use crate::OutputFormat;

pub fn run(package: &Path, format: OutputFormat) -> Result<ExitCode> {
    let mut container = OpcContainer::open(package)
        .with_context(|| format!("Failed to open package: {}", package.display()))?;
    let parts = describe_package(&mut container);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => write_text(&mut handle, package, &parts)?,
        OutputFormat::Json => write_json(&mut handle, &parts)?,
    }
    Ok(ExitCode::from(0))
}

fn write_text(out: &mut impl Write, package: &Path, parts: &[PartInfo]) -> Result<()> {
    let filename = package
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_else(|| package.to_string_lossy());
    writeln!(out, "Package: {}", filename)?;
    writeln!(out, "Parts: {}", parts.len())?;
    for part in parts {
        let kind = part.kind.unwrap_or("-");
        let optional = match part.optional {
            Some(true) => " (optional)",
            Some(false) => " (required)",
            None => "",
        };
        writeln!(out, "  - {} [{}] {} bytes{}", part.path, kind, part.size, optional)?;
    }
    Ok(())
}

fn write_json(out: &mut impl Write, parts: &[PartInfo]) -> Result<()> {
    let items: Vec<_> = parts
        .iter()
        .map(|part| {
            json!({
                "path": part.path,
                "size": part.size,
                "kind": part.kind,
                "optional": part.optional,
            })
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &items)?;
    writeln!(out)?;
    Ok(())
}
