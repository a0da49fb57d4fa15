//! Banter compiler.
//!
//! Unified entry point for the Banter compilation pipeline. Parses
//! every script, validates the merged project, then lowers sections
//! into the flat node tables the runtime executes.

pub mod meta;

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use sha2::{Digest, Sha256};
use thiserror::Error;

use banter_artifact::{
    Artifact, CompiledExpr, CompiledFragment, CompiledLine, CompiledNode, CompiledOption,
    EnvironmentSpec, MarkupSpec, MarkupState, NodeKind, SectionTable, SourceInfo, Value,
    ValueType, VariableSpec, END_NODE,
};
use banter_dsl::config::ConfigValue;
use banter_dsl::text::TagStack;
use banter_dsl::{
    has_errors, parse_source, validate, Assignment, BinaryOp, Diagnostic, DialogLine, Expr,
    Fragment, Literal, Node, ProjectConfig, Section, Severity, SourceSet, UnaryOp, VarType,
};

use crate::meta::Metadata;

// =============================================================================
// Errors and output
// =============================================================================

/// A fatal compile failure.
///
/// Problems inside the scripts surface as positioned [`Diagnostic`]s
/// in [`CompileError::Rejected`]; the other variants are project-level
/// faults with no useful source location.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{errors} error(s) in project sources")]
    Rejected {
        errors: usize,
        diagnostics: Vec<Diagnostic>,
    },
    #[error("duplicate section name: {name}")]
    DuplicateSection { name: String },
    #[error("metadata entry {section}/{line_id} matches no line")]
    DanglingMetadata { section: String, line_id: String },
    #[error("speaker '{speaker}' is not in the configured speaker list")]
    DisallowedSpeaker { speaker: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A successful compile: the artifact plus any warnings the sources
/// produced along the way.
#[derive(Debug)]
pub struct CompileOutput {
    pub artifact: Artifact,
    pub diagnostics: Vec<Diagnostic>,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Compile a set of Banter scripts into one artifact.
///
/// The pipeline runs in order:
/// 1. **Parse**: each input becomes a list of sections.
/// 2. **Validate**: project-wide analysis across every parsed file.
/// 3. **Lower**: sections become node tables with every destination
///    resolved and external metadata folded into its lines.
///
/// Any error diagnostic rejects the whole compile; warnings ride along
/// on success. Input order is meaningful: it fixes section order,
/// speaker order, and the build id.
pub fn compile(
    inputs: &[(PathBuf, String)],
    config: &ProjectConfig,
    mut metadata: Metadata,
) -> Result<CompileOutput, CompileError> {
    let mut diagnostics = Vec::new();
    let mut sources = Vec::new();
    let mut parsed = SourceSet::default();

    for (path, source) in inputs {
        sources.push(SourceInfo {
            path: path.display().to_string(),
            hash: sha256_hex(source.as_bytes()),
        });
        if let Some(sections) = parse_source(path, source, &mut diagnostics) {
            parsed.insert(path.clone(), sections);
        }
    }

    diagnostics.extend(validate(&parsed, config));
    if has_errors(&diagnostics) {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        return Err(CompileError::Rejected {
            errors,
            diagnostics,
        });
    }

    let mut speakers = IndexSet::new();
    let mut tables: IndexMap<String, SectionTable> = IndexMap::new();
    for (path, file_sections) in &parsed {
        let source_file = path.display().to_string();
        for section in file_sections {
            let table = emit_section(section, &source_file, config, &mut metadata, &mut speakers)?;
            if tables.insert(section.name.clone(), table).is_some() {
                // Validation already rejects duplicate names; this
                // guards the artifact against a bypassed pipeline.
                return Err(CompileError::DuplicateSection {
                    name: section.name.clone(),
                });
            }
        }
    }

    if let Some((section, line_id)) = metadata.first_dangling() {
        return Err(CompileError::DanglingMetadata {
            section: section.to_string(),
            line_id: line_id.to_string(),
        });
    }

    // The build id chains the per-file content hashes, so it shifts
    // when any script changes or the input order does.
    let mut hasher = Sha256::new();
    for info in &sources {
        hasher.update(info.hash.as_bytes());
    }
    let build_id = format!("{:x}", hasher.finalize());

    let artifact = Artifact {
        build_id,
        speaker_ids: speakers.into_iter().collect(),
        sources,
        environment: environment_spec(config),
        sections: tables,
    };
    Ok(CompileOutput {
        artifact,
        diagnostics,
    })
}

/// [`compile`] over files on disk, read in the given order.
pub fn compile_files(
    paths: &[PathBuf],
    config: &ProjectConfig,
    metadata: Metadata,
) -> Result<CompileOutput, CompileError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        inputs.push((path.clone(), source));
    }
    compile(&inputs, config, metadata)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// Lowering
// =============================================================================

fn emit_section(
    section: &Section,
    source_file: &str,
    config: &ProjectConfig,
    metadata: &mut Metadata,
    speakers: &mut IndexSet<String>,
) -> Result<SectionTable, CompileError> {
    let mut nodes = IndexMap::new();
    for (pos, node) in section.nodes.iter().enumerate() {
        // Position decides what a missing destination means.
        let fallthrough = section
            .nodes
            .get(pos + 1)
            .map(|n| n.meta().id.as_str())
            .unwrap_or(END_NODE);
        let kind = match node {
            Node::Say {
                speaker_id,
                line,
                next,
                ..
            } => {
                if let Some(allowed) = &config.speaker_ids {
                    if !allowed.contains(speaker_id) {
                        return Err(CompileError::DisallowedSpeaker {
                            speaker: speaker_id.clone(),
                        });
                    }
                }
                speakers.insert(speaker_id.clone());
                NodeKind::Say {
                    speaker_id: speaker_id.clone(),
                    line: emit_line(line, &section.name, metadata),
                    next: next.clone().unwrap_or_else(|| fallthrough.to_string()),
                }
            }
            Node::Choice { options, .. } => NodeKind::Choice {
                options: options
                    .iter()
                    .map(|option| CompiledOption {
                        cond: option.cond.as_ref().map(|expr| compile_expr(&expr.ast)),
                        line: emit_line(&option.line, &section.name, metadata),
                        dest: option.dest.clone(),
                    })
                    .collect(),
            },
            Node::If {
                cond,
                true_dest,
                false_dest,
                ..
            } => NodeKind::If {
                cond: compile_expr(&cond.ast),
                true_dest: true_dest.clone(),
                false_dest: false_dest
                    .clone()
                    .unwrap_or_else(|| fallthrough.to_string()),
            },
            Node::Run { code, .. } => NodeKind::Run {
                code: compile_assignment(&code.ast),
                next: fallthrough.to_string(),
            },
            Node::Goto { dest, .. } => NodeKind::Goto { dest: dest.clone() },
            Node::Rand { dests, .. } => NodeKind::Rand {
                dests: dests.clone(),
            },
        };
        nodes.insert(
            node.meta().id.clone(),
            CompiledNode {
                tags: node.meta().tags.clone(),
                kind,
            },
        );
    }
    let start_node = section
        .nodes
        .first()
        .map(|n| n.meta().id.clone())
        .unwrap_or_else(|| END_NODE.to_string());
    Ok(SectionTable {
        source_file: source_file.to_string(),
        start_node,
        nodes,
    })
}

/// Lower one dialogue line: replay the markup tags across the scanned
/// fragments so every fragment carries the tags open over it, and fold
/// in any external metadata registered for the line id.
fn emit_line(line: &DialogLine, section: &str, metadata: &mut Metadata) -> CompiledLine {
    let mut stack = TagStack::new();
    let mut text = Vec::new();
    for fragment in &line.fragments {
        match fragment {
            Fragment::Text(value) => text.push(CompiledFragment::Text {
                tags: markup_states(&stack),
                text: value.clone(),
            }),
            Fragment::Variable(name) => text.push(CompiledFragment::Variable {
                tags: markup_states(&stack),
                variable: name.clone(),
            }),
            Fragment::TagOpen { name, parameter } => stack.open(name, parameter.as_deref()),
            Fragment::TagClose { name } => {
                // Unbalanced closes were already warned about.
                stack.close(name);
            }
        }
    }
    let meta = line
        .line_id
        .as_ref()
        .and_then(|id| metadata.take(section, id));
    CompiledLine {
        line_id: line.line_id.clone(),
        text,
        meta,
    }
}

fn markup_states(stack: &TagStack) -> Vec<MarkupState> {
    stack
        .snapshot()
        .iter()
        .map(|(name, parameter)| MarkupState {
            name: name.clone(),
            parameter: parameter.clone(),
        })
        .collect()
}

fn compile_expr(expr: &Expr) -> CompiledExpr {
    match expr {
        Expr::Literal(Literal::Bool(value)) => CompiledExpr::LiteralBool { value: *value },
        Expr::Literal(Literal::Int(value)) => CompiledExpr::LiteralInt { value: *value },
        Expr::Literal(Literal::Float(value)) => CompiledExpr::LiteralFloat { value: *value },
        Expr::Literal(Literal::Str(value)) => CompiledExpr::LiteralString {
            value: value.clone(),
        },
        Expr::Ident(name) => CompiledExpr::Variable { name: name.clone() },
        Expr::Unary {
            op: UnaryOp::Not,
            rhs,
        } => CompiledExpr::UnaryNot {
            rhs: Box::new(compile_expr(rhs)),
        },
        Expr::Binary { op, lhs, rhs } => {
            let lhs = Box::new(compile_expr(lhs));
            let rhs = Box::new(compile_expr(rhs));
            match op {
                BinaryOp::Or => CompiledExpr::BinaryOr { lhs, rhs },
                BinaryOp::And => CompiledExpr::BinaryAnd { lhs, rhs },
                BinaryOp::Lt => CompiledExpr::BinaryLt { lhs, rhs },
                BinaryOp::Le => CompiledExpr::BinaryLe { lhs, rhs },
                BinaryOp::Eq => CompiledExpr::BinaryEq { lhs, rhs },
                BinaryOp::Ne => CompiledExpr::BinaryNe { lhs, rhs },
                BinaryOp::Gt => CompiledExpr::BinaryGt { lhs, rhs },
                BinaryOp::Ge => CompiledExpr::BinaryGe { lhs, rhs },
                BinaryOp::Add => CompiledExpr::BinaryAdd { lhs, rhs },
                BinaryOp::Sub => CompiledExpr::BinarySub { lhs, rhs },
                BinaryOp::Mul => CompiledExpr::BinaryMul { lhs, rhs },
                BinaryOp::Div => CompiledExpr::BinaryDiv { lhs, rhs },
            }
        }
    }
}

fn compile_assignment(assign: &Assignment) -> CompiledExpr {
    CompiledExpr::Assign {
        name: assign.name.clone(),
        value: Box::new(compile_expr(&assign.value)),
    }
}

// =============================================================================
// Environment
// =============================================================================

fn environment_spec(config: &ProjectConfig) -> EnvironmentSpec {
    let variables = config
        .variables()
        .unwrap_or_default()
        .iter()
        .map(|decl| VariableSpec {
            name: decl.name.clone(),
            ty: value_type(decl.ty),
            default: decl
                .default
                .as_ref()
                .map(|value| default_value(decl.ty, value)),
        })
        .collect();
    let markup = config
        .markup()
        .unwrap_or_default()
        .iter()
        .map(|decl| MarkupSpec {
            name: decl.name.clone(),
            parameter: decl.parameter.clone(),
        })
        .collect();
    EnvironmentSpec { variables, markup }
}

fn value_type(ty: VarType) -> ValueType {
    match ty {
        VarType::Bool => ValueType::Bool,
        VarType::Int => ValueType::Int,
        VarType::Float => ValueType::Float,
        VarType::String => ValueType::String,
    }
}

/// Integer defaults declared for float variables become floats here, so
/// the runtime never sees a type it has to coerce.
fn default_value(ty: VarType, value: &ConfigValue) -> Value {
    match (ty, value) {
        (VarType::Float, ConfigValue::Int(n)) => Value::Float(*n as f64),
        (_, ConfigValue::Bool(b)) => Value::Bool(*b),
        (_, ConfigValue::Int(n)) => Value::Int(*n),
        (_, ConfigValue::Float(x)) => Value::Float(*x),
        (_, ConfigValue::String(s)) => Value::String(s.clone()),
    }
}
