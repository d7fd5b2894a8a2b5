mod commands;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use pbixproj::{ContainerError, PbixError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pbixproj")]
#[command(about = "Extract Power BI packages into source-controllable folders and compile them back")]
#[command(version)]
pub struct Cli {
    #[arg(long, short, global = true, action = clap::ArgAction::Count, help = "More log output (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Extract a PBIX/PBIT file into a project folder")]
    Extract {
        #[arg(help = "Path to the .pbix or .pbit file")]
        package: PathBuf,
        #[arg(long, short, value_name = "DIR", help = "Project folder (default: next to the package, named after it)")]
        output: Option<PathBuf>,
    },
    #[command(about = "Compile a project folder into a PBIT file")]
    Compile {
        #[arg(help = "Path to the project folder")]
        folder: PathBuf,
        #[arg(long, short, value_name = "FILE", help = "Output file (default: <folder>.pbit)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Replace the output file if it exists")]
        overwrite: bool,
    },
    #[command(about = "List the parts of a PBIX/PBIT file")]
    Info {
        #[arg(help = "Path to the .pbix or .pbit file")]
        package: PathBuf,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Extract { package, output } => commands::extract::run(&package, output),
        Commands::Compile {
            folder,
            output,
            overwrite,
        } => commands::compile::run(&folder, output, overwrite),
        Commands::Info { package, format } => commands::info::run(&package, format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for_error(&e)
        }
    }
}

fn exit_code_for_error(err: &anyhow::Error) -> ExitCode {
    if is_internal_error(err) {
        ExitCode::from(3)
    } else {
        ExitCode::from(2)
    }
}

fn is_internal_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(pbix_err) = cause.downcast_ref::<PbixError>() {
            return !matches!(
                pbix_err,
                PbixError::ProjectNotFound { .. } | PbixError::Container(ContainerError::Io(_))
            );
        }
        if let Some(container_err) = cause.downcast_ref::<ContainerError>() {
            return !matches!(container_err, ContainerError::Io(_));
        }
        false
    })
}
