use anyhow::{Context, Result, bail};
use pbixproj::PbixModel;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn run(folder: &Path, output: Option<PathBuf>, overwrite: bool) -> Result<ExitCode> {
    let output = output.unwrap_or_else(|| default_output(folder));
    if output.exists() && !overwrite {
        bail!(
            "Output file already exists: {} (use --overwrite to replace it)",
            output.display()
        );
    }

    let model = PbixModel::from_folder(folder)
        .with_context(|| format!("Failed to read project folder: {}", folder.display()))?;
    model
        .save(&output)
        .with_context(|| format!("Failed to write package: {}", output.display()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "Compiled {} into {}", folder.display(), output.display())?;
    Ok(ExitCode::from(0))
}

/// `Sales/` -> `Sales.pbit` next to it.
fn default_output(folder: &Path) -> PathBuf {
    let mut name = folder
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "project".into());
    name.push(".pbit");
    folder.with_file_name(name)
}
