//! Front-end for the Banter dialogue language.
//!
//! Parses `.btr` scripts into a typed AST and checks whole projects
//! against their configuration. The compiler and tooling build on the
//! types exported here; playback never sees this crate.

pub mod ast;
pub mod config;
pub mod diag;
pub mod expr;
pub mod parser;
pub mod text;
pub mod validate;

pub use ast::*;
pub use config::{load_config, ConfigError, MarkupDecl, ProjectConfig, VarType, VariableDecl};
pub use diag::{has_errors, Diagnostic, Severity, SourceLoc};
pub use parser::{parse, parse_source};
pub use validate::validate;

use std::path::PathBuf;

use indexmap::IndexMap;

/// Parsed sections per input file, in input order.
pub type SourceSet = IndexMap<PathBuf, Vec<Section>>;
