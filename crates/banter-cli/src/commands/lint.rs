//! `banter lint`
//!
//! Parse and analyze without emitting anything. Any diagnostic at all,
//! warning included, makes the exit status nonzero so the command
//! works as a commit gate.

use std::path::PathBuf;
use std::process;

use banter_dsl::{parse_source, validate, SourceSet};
use clap::Args;

use super::{print_diagnostic, project_config};

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Script files to check
    #[arg(required = true)]
    pub input: Vec<PathBuf>,

    /// Project config YAML
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stay silent when nothing is wrong
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: LintArgs) -> Result<(), String> {
    let config = project_config(args.config.as_deref())?;

    let mut diagnostics = Vec::new();
    let mut sources = SourceSet::default();
    for path in &args.input {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        if let Some(sections) = parse_source(path, &text, &mut diagnostics) {
            sources.insert(path.clone(), sections);
        }
    }
    diagnostics.extend(validate(&sources, &config));

    for diag in &diagnostics {
        print_diagnostic(diag);
    }
    if !diagnostics.is_empty() {
        process::exit(1);
    }
    if !args.quiet {
        eprintln!("No warnings or errors");
    }
    Ok(())
}
