//! Project analysis.
//!
//! Nine independent passes over the parsed project. All of them always
//! run and only accumulate diagnostics, so one broken thing never
//! hides another. Passes that need configuration switch themselves off
//! when the config omits the section they depend on; the markup
//! balance pass needs nothing and never switches off.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::path::Path;

use crate::ast::{Assignment, BinaryOp, Expr, Fragment, Literal, Node, Section, UnaryOp};
use crate::config::{full_match_regex, MarkupDecl, ProjectConfig, VarType, VariableDecl};
use crate::diag::{Diagnostic, SourceLoc};
use crate::text::TagStack;
use crate::SourceSet;

/// Run every pass over the project.
pub fn validate(sources: &SourceSet, config: &ProjectConfig) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    check_section_names(sources, &mut diags);
    check_duplicate_ids(sources, &mut diags);
    check_speakers(sources, config, &mut diags);
    check_node_refs(sources, &mut diags);
    check_reachability(sources, &mut diags);
    check_interpolations(sources, config, &mut diags);
    check_markup_balance(sources, &mut diags);
    check_known_markup(sources, config, &mut diags);
    check_expr_types(sources, config, &mut diags);
    diags
}

/// Every repeated occurrence of a value, reported at the place of the
/// repeat.
fn duplicates<T, L>(items: impl Iterator<Item = (T, L)>) -> Vec<(T, L)>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for (value, loc) in items {
        if !seen.insert(value.clone()) {
            dups.push((value, loc));
        }
    }
    dups
}

// =============================================================================
// Names and References
// =============================================================================

/// Section names must be unique across the whole project, because
/// compiled sections merge into one table.
fn check_section_names(sources: &SourceSet, diags: &mut Vec<Diagnostic>) {
    let mut names = Vec::new();
    for (path, sections) in sources {
        for section in sections {
            names.push((section.name.clone(), (path.as_path(), section.loc)));
        }
    }
    for (name, (path, loc)) in duplicates(names.into_iter()) {
        diags.push(Diagnostic::error(
            path,
            loc,
            format!("Duplicate section name: {name}"),
        ));
    }
}

/// Node ids must be unique within their section; line ids project-wide.
fn check_duplicate_ids(sources: &SourceSet, diags: &mut Vec<Diagnostic>) {
    for (path, sections) in sources {
        for section in sections {
            let ids = section
                .nodes
                .iter()
                .map(|n| (n.meta().id.clone(), n.meta().loc));
            for (id, loc) in duplicates(ids) {
                diags.push(Diagnostic::error(
                    path,
                    loc,
                    format!("Duplicate node id: {id}"),
                ));
            }
        }
    }

    let mut line_ids = Vec::new();
    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                for line in node.lines() {
                    if let Some(id) = &line.line_id {
                        line_ids.push((id.clone(), (path.as_path(), line.loc)));
                    }
                }
            }
        }
    }
    for (id, (path, loc)) in duplicates(line_ids.into_iter()) {
        diags.push(Diagnostic::error(
            path,
            loc,
            format!("Duplicate line id: {id}"),
        ));
    }
}

/// Explicit destinations of a statement, with the best location we
/// have for each.
fn node_edges(node: &Node) -> Vec<(&str, SourceLoc)> {
    let loc = node.meta().loc;
    match node {
        Node::Say { next, .. } => next.iter().map(|d| (d.as_str(), loc)).collect(),
        Node::Choice { options, .. } => options
            .iter()
            .map(|o| (o.dest.as_str(), o.line.loc))
            .collect(),
        Node::If {
            true_dest,
            false_dest,
            ..
        } => {
            let mut edges = vec![(true_dest.as_str(), loc)];
            if let Some(dest) = false_dest {
                edges.push((dest.as_str(), loc));
            }
            edges
        }
        Node::Run { .. } => Vec::new(),
        Node::Goto { dest, .. } => vec![(dest.as_str(), loc)],
        Node::Rand { dests, .. } => dests.iter().map(|d| (d.as_str(), loc)).collect(),
    }
}

/// Every destination must name a node in the same section, or `end`.
/// Declaring a node as `end` is also caught here.
fn check_node_refs(sources: &SourceSet, diags: &mut Vec<Diagnostic>) {
    for (path, sections) in sources {
        for section in sections {
            let known: HashSet<&str> = section.nodes.iter().map(|n| n.meta().id.as_str()).collect();
            for node in &section.nodes {
                if node.meta().id == "end" {
                    diags.push(Diagnostic::error(
                        path,
                        node.meta().loc,
                        "'end' is reserved and cannot be used as a node id",
                    ));
                }
                for (dest, loc) in node_edges(node) {
                    if dest != "end" && !known.contains(dest) {
                        diags.push(Diagnostic::error(
                            path,
                            loc,
                            format!("Invalid node id: {dest}"),
                        ));
                    }
                }
            }
        }
    }
}

/// With `speaker_ids` configured, every say line's speaker must be in
/// the list.
fn check_speakers(sources: &SourceSet, config: &ProjectConfig, diags: &mut Vec<Diagnostic>) {
    let Some(allowed) = &config.speaker_ids else {
        return;
    };
    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                if let Node::Say {
                    speaker_id, meta, ..
                } = node
                {
                    if !allowed.iter().any(|s| s == speaker_id) {
                        diags.push(Diagnostic::error(
                            path,
                            meta.loc,
                            format!("Invalid speaker: {speaker_id}"),
                        ));
                    }
                }
            }
        }
    }
}

// =============================================================================
// Reachability
// =============================================================================

/// Walk the section's control flow from its first statement. Position
/// fallthrough counts as an edge. Destinations that do not resolve are
/// skipped; the reference pass already reported them.
fn reachable_nodes(section: &Section) -> Vec<bool> {
    let mut positions: HashMap<&str, usize> = section
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.meta().id.as_str(), i))
        .collect();
    positions.insert("end", section.nodes.len());

    let mut visited = vec![false; section.nodes.len()];
    let mut stack = vec![0usize];
    while let Some(idx) = stack.pop() {
        if idx >= section.nodes.len() || visited[idx] {
            continue;
        }
        visited[idx] = true;
        let push_dest = |stack: &mut Vec<usize>, dest: &str| {
            if let Some(&i) = positions.get(dest) {
                stack.push(i);
            }
        };
        match &section.nodes[idx] {
            Node::Say { next, .. } => match next {
                Some(dest) => push_dest(&mut stack, dest),
                None => stack.push(idx + 1),
            },
            Node::Choice { options, .. } => {
                for opt in options {
                    push_dest(&mut stack, &opt.dest);
                }
            }
            Node::If {
                true_dest,
                false_dest,
                ..
            } => {
                push_dest(&mut stack, true_dest);
                match false_dest {
                    Some(dest) => push_dest(&mut stack, dest),
                    None => stack.push(idx + 1),
                }
            }
            Node::Run { .. } => stack.push(idx + 1),
            Node::Goto { dest, .. } => push_dest(&mut stack, dest),
            Node::Rand { dests, .. } => {
                for dest in dests {
                    push_dest(&mut stack, dest);
                }
            }
        }
    }
    visited
}

fn check_reachability(sources: &SourceSet, diags: &mut Vec<Diagnostic>) {
    for (path, sections) in sources {
        for section in sections {
            let visited = reachable_nodes(section);
            for (node, seen) in section.nodes.iter().zip(&visited) {
                if !seen {
                    diags.push(Diagnostic::warning(path, node.meta().loc, "Unreachable node"));
                }
            }
        }
    }
}

// =============================================================================
// Dialogue Text
// =============================================================================

/// With variables configured, `{name}` must interpolate a declared
/// one.
fn check_interpolations(sources: &SourceSet, config: &ProjectConfig, diags: &mut Vec<Diagnostic>) {
    let Some(variables) = config.variables() else {
        return;
    };
    let known: HashSet<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                for line in node.lines() {
                    for fragment in &line.fragments {
                        if let Fragment::Variable(name) = fragment {
                            if !known.contains(name.as_str()) {
                                diags.push(Diagnostic::warning(
                                    path,
                                    line.loc,
                                    format!("Invalid variable interpolation: {name}"),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Markup tags must nest properly and be closed before the line ends.
/// A broken nesting abandons the rest of the line.
fn check_markup_balance(sources: &SourceSet, diags: &mut Vec<Diagnostic>) {
    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                for line in node.lines() {
                    let mut stack = TagStack::new();
                    let mut abandoned = false;
                    for fragment in &line.fragments {
                        match fragment {
                            Fragment::TagOpen { name, parameter } => {
                                stack.open(name, parameter.as_deref());
                            }
                            Fragment::TagClose { name } => {
                                if !stack.close(name) {
                                    diags.push(Diagnostic::warning(
                                        path,
                                        line.loc,
                                        format!("Invalid nesting of markup tags: {name}"),
                                    ));
                                    abandoned = true;
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    if !abandoned && !stack.is_empty() {
                        diags.push(Diagnostic::warning(
                            path,
                            line.loc,
                            format!("Unclosed markup tags: {}", stack.open_names().join(", ")),
                        ));
                    }
                }
            }
        }
    }
}

/// With markup configured, tags must be declared and parameters must
/// obey the declared pattern. A close of an undeclared tag is an
/// error because it can never balance.
fn check_known_markup(sources: &SourceSet, config: &ProjectConfig, diags: &mut Vec<Diagnostic>) {
    let Some(markup) = config.markup() else {
        return;
    };
    let decls: HashMap<&str, &MarkupDecl> = markup.iter().map(|m| (m.name.as_str(), m)).collect();
    let patterns: HashMap<&str, regex::Regex> = markup
        .iter()
        .filter_map(|m| {
            let pattern = m.parameter.as_ref()?;
            Some((m.name.as_str(), full_match_regex(pattern).ok()?))
        })
        .collect();

    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                for line in node.lines() {
                    for fragment in &line.fragments {
                        match fragment {
                            Fragment::TagOpen { name, parameter } => {
                                let Some(decl) = decls.get(name.as_str()) else {
                                    diags.push(Diagnostic::warning(
                                        path,
                                        line.loc,
                                        format!("Invalid markup tag: {name}"),
                                    ));
                                    continue;
                                };
                                match (&decl.parameter, parameter) {
                                    (None, Some(_)) => {
                                        diags.push(Diagnostic::warning(
                                            path,
                                            line.loc,
                                            format!("Parameter not allowed for markup tag: {name}"),
                                        ));
                                    }
                                    (Some(_), Some(param)) => {
                                        if let Some(re) = patterns.get(name.as_str()) {
                                            if !re.is_match(param) {
                                                diags.push(Diagnostic::warning(
                                                    path,
                                                    line.loc,
                                                    format!(
                                                        "Invalid parameter for markup tag '{name}': {param}"
                                                    ),
                                                ));
                                            }
                                        }
                                    }
                                    _ => {}
                                }
                            }
                            Fragment::TagClose { name } => {
                                if !decls.contains_key(name.as_str()) {
                                    diags.push(Diagnostic::error(
                                        path,
                                        line.loc,
                                        format!("Invalid markup tag: {name}"),
                                    ));
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Expression Types
// =============================================================================

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Bool,
    Int,
    Float,
    String,
    Assign,
}

impl From<VarType> for ExprType {
    fn from(ty: VarType) -> Self {
        match ty {
            VarType::Bool => ExprType::Bool,
            VarType::Int => ExprType::Int,
            VarType::Float => ExprType::Float,
            VarType::String => ExprType::String,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Bool => write!(f, "bool"),
            ExprType::Int => write!(f, "int"),
            ExprType::Float => write!(f, "float"),
            ExprType::String => write!(f, "string"),
            ExprType::Assign => write!(f, "assign"),
        }
    }
}

fn is_numeric(ty: ExprType) -> bool {
    matches!(ty, ExprType::Int | ExprType::Float)
}

/// Infer an expression's type against the declared variables.
pub fn infer_type(vars: &[VariableDecl], expr: &Expr) -> Result<ExprType, String> {
    match expr {
        Expr::Literal(Literal::Bool(_)) => Ok(ExprType::Bool),
        Expr::Literal(Literal::Int(_)) => Ok(ExprType::Int),
        Expr::Literal(Literal::Float(_)) => Ok(ExprType::Float),
        Expr::Literal(Literal::Str(_)) => Ok(ExprType::String),
        Expr::Ident(name) => vars
            .iter()
            .find(|v| v.name == *name)
            .map(|v| v.ty.into())
            .ok_or_else(|| format!("Undeclared variable: {name}")),
        Expr::Unary {
            op: UnaryOp::Not,
            rhs,
        } => {
            if infer_type(vars, rhs)? != ExprType::Bool {
                return Err("Operand of 'not' operator must be bool".to_string());
            }
            Ok(ExprType::Bool)
        }
        Expr::Binary { op, lhs, rhs } => infer_binary(vars, *op, lhs, rhs),
    }
}

fn infer_binary(
    vars: &[VariableDecl],
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<ExprType, String> {
    let lt = infer_type(vars, lhs)?;
    let rt = infer_type(vars, rhs)?;
    match op {
        BinaryOp::Or | BinaryOp::And => {
            if lt != ExprType::Bool {
                return Err(format!("Lhs of {op} operator must be bool"));
            }
            if rt != ExprType::Bool {
                return Err(format!("Rhs of {op} operator must be bool"));
            }
            Ok(ExprType::Bool)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            if lt == rt || (is_numeric(lt) && is_numeric(rt)) {
                Ok(ExprType::Bool)
            } else {
                Err(format!(
                    "Lhs ({lt}) and Rhs ({rt}) of {op} operator must be of convertible types"
                ))
            }
        }
        BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge
        | BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div => {
            if !is_numeric(lt) {
                return Err(format!("Lhs of {op} operator must be number"));
            }
            if !is_numeric(rt) {
                return Err(format!("Rhs of {op} operator must be number"));
            }
            if op.is_ordering() {
                Ok(ExprType::Bool)
            } else if lt == ExprType::Int && rt == ExprType::Int {
                Ok(ExprType::Int)
            } else {
                Ok(ExprType::Float)
            }
        }
    }
}

/// Check a run body: the value's type must equal the variable's
/// declared type exactly.
pub fn infer_assignment(vars: &[VariableDecl], assign: &Assignment) -> Result<ExprType, String> {
    let declared: ExprType = vars
        .iter()
        .find(|v| v.name == assign.name)
        .map(|v| v.ty.into())
        .ok_or_else(|| format!("Undeclared variable: {}", assign.name))?;
    let value = infer_type(vars, &assign.value)?;
    if value != declared {
        return Err(format!(
            "Lhs ({declared}) and Rhs ({value}) of assignment must be of the same type"
        ));
    }
    Ok(ExprType::Assign)
}

// TODO: attach per-expression spans so these errors point into the
// code block instead of at the statement.
fn check_node_exprs(
    path: &Path,
    vars: &[VariableDecl],
    node: &Node,
    diags: &mut Vec<Diagnostic>,
) {
    let loc = node.meta().loc;
    let result = (|| -> Result<(), String> {
        match node {
            Node::Choice { options, .. } => {
                for opt in options {
                    if let Some(cond) = &opt.cond {
                        if infer_type(vars, &cond.ast)? != ExprType::Bool {
                            diags.push(Diagnostic::error(path, loc, "Expression must be bool"));
                        }
                    }
                }
            }
            Node::If { cond, .. } => {
                if infer_type(vars, &cond.ast)? != ExprType::Bool {
                    diags.push(Diagnostic::error(path, loc, "Expression must be bool"));
                }
            }
            Node::Run { code, .. } => {
                infer_assignment(vars, &code.ast)?;
            }
            _ => {}
        }
        Ok(())
    })();
    if let Err(message) = result {
        diags.push(Diagnostic::error(path, loc, message));
    }
}

/// With variables configured, guards must be bool and run bodies must
/// assign a value of the variable's declared type. The first inference
/// failure abandons the rest of the statement.
fn check_expr_types(sources: &SourceSet, config: &ProjectConfig, diags: &mut Vec<Diagnostic>) {
    let Some(variables) = config.variables() else {
        return;
    };
    for (path, sections) in sources {
        for section in sections {
            for node in &section.nodes {
                check_node_exprs(path, variables, node, diags);
            }
        }
    }
}
