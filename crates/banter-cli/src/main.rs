//! Banter CLI.
//!
//! One binary for the whole toolchain: compile scripts into artifacts,
//! lint them, play an artifact in the terminal, and read or edit the
//! sidecar metadata.

use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{ast, compile, lint, meta, play};

#[derive(Parser, Debug)]
#[command(name = "banter")]
#[command(about = "Tools for the Banter dialogue language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile scripts into a runnable artifact
    Compile(compile::CompileArgs),
    /// Parse and analyze scripts without emitting anything
    Lint(lint::LintArgs),
    /// Play a compiled artifact interactively
    Play(play::PlayArgs),
    /// Read or edit sidecar line metadata
    Meta(meta::MetaArgs),
    /// Dump the parsed form of a script or expression
    Ast(ast::AstArgs),
}

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile(args) => compile::run(args),
        Commands::Lint(args) => lint::run(args),
        Commands::Play(args) => play::run(args),
        Commands::Meta(args) => meta::run(args),
        Commands::Ast(args) => ast::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
