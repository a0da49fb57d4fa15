//! `banter compile`

use std::path::PathBuf;

use banter_compiler::meta::Metadata;
use banter_compiler::{compile_files, CompileError};
use clap::Args;
use tracing::info;

use super::{print_diagnostic, project_config};

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Script files, in section order
    #[arg(required = true)]
    pub input: Vec<PathBuf>,

    /// Project config YAML
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sidecar metadata JSON to fold into lines
    #[arg(short, long)]
    pub meta: Option<PathBuf>,

    /// Artifact output path
    #[arg(short, long, default_value = "compiled.json")]
    pub output: PathBuf,
}

pub fn run(args: CompileArgs) -> Result<(), String> {
    let config = project_config(args.config.as_deref())?;
    let metadata = match &args.meta {
        Some(path) => Metadata::load(path).map_err(|e| e.to_string())?,
        None => Metadata::default(),
    };

    match compile_files(&args.input, &config, metadata) {
        Ok(output) => {
            for diag in &output.diagnostics {
                print_diagnostic(diag);
            }
            output
                .artifact
                .save(&args.output)
                .map_err(|e| e.to_string())?;
            info!("wrote {}", args.output.display());
            Ok(())
        }
        Err(CompileError::Rejected {
            errors,
            diagnostics,
        }) => {
            for diag in &diagnostics {
                print_diagnostic(diag);
            }
            Err(format!("{errors} error(s) in project sources"))
        }
        Err(e) => Err(e.to_string()),
    }
}
