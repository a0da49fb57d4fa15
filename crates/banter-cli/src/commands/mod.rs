//! Subcommand implementations.

pub mod ast;
pub mod compile;
pub mod lint;
pub mod meta;
pub mod play;

use std::path::Path;

use banter_dsl::{load_config, Diagnostic, ProjectConfig, Severity};
use colored::Colorize;

/// Print one diagnostic: colored severity, dimmed location, plain
/// message. Goes to stderr so piped output stays clean.
fn print_diagnostic(diag: &Diagnostic) {
    let severity = match diag.severity {
        Severity::Warning => "warning".yellow(),
        Severity::Error => "error".red(),
    };
    let location = format!(
        "{}:{}:{}:",
        diag.file.display(),
        diag.loc.line,
        diag.loc.column
    );
    eprintln!("{} {} {}", severity, location.as_str().dimmed(), diag.message);
}

/// Load the `-c` config, or fall back to an empty one.
fn project_config(path: Option<&Path>) -> Result<ProjectConfig, String> {
    match path {
        Some(path) => load_config(path).map_err(|e| e.to_string()),
        None => Ok(ProjectConfig::default()),
    }
}
