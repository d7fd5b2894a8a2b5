use anyhow::{Context, Result, bail};
use pbixproj::PbixModel;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn run(package: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    if !package.is_file() {
        bail!("Package not found: {}", package.display());
    }
    let folder = output.unwrap_or_else(|| default_folder(package));

    let model = PbixModel::load(package)
        .with_context(|| format!("Failed to read package: {}", package.display()))?;
    let summary = model
        .extract_to(&folder)
        .with_context(|| format!("Failed to extract into: {}", folder.display()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "Extracted {} into {}", package.display(), folder.display())?;
    writeln!(handle, "Files written: {}", summary.written_files)?;
    if summary.pruned.deleted_files > 0 {
        writeln!(handle, "Stale files removed: {}", summary.pruned.deleted_files)?;
    }
    if summary.failed_parts.is_empty() {
        return Ok(ExitCode::from(0));
    }

    for failure in &summary.failed_parts {
        eprintln!("Part '{}' failed [{}]: {}", failure.part, failure.code, failure.message);
    }
    Ok(ExitCode::from(3))
}

/// `Sales.pbix` -> `Sales/` in the same directory.
fn default_folder(package: &Path) -> PathBuf {
    let stem = package
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "project".into());
    package.with_file_name(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_folder_drops_the_extension() {
        assert_eq!(
            default_folder(Path::new("reports/Sales.pbix")),
            PathBuf::from("reports/Sales")
        );
    }
}
