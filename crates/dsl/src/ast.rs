//! AST for Banter dialogue scripts.
//!
//! The parser produces a list of [`Section`]s per file. Each section is
//! an ordered list of statements; order matters because control flow
//! falls through to the next statement when no explicit destination is
//! given.

use std::fmt;

use crate::diag::SourceLoc;

// =============================================================================
// Dialogue lines
// =============================================================================

/// One piece of a scanned dialogue line.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Literal display text. Adjacent literals are coalesced.
    Text(String),
    /// A `{name}` interpolation.
    Variable(String),
    /// A `[name]` or `[name:param]` opening tag.
    TagOpen {
        name: String,
        parameter: Option<String>,
    },
    /// A `[/name]` closing tag.
    TagClose { name: String },
}

/// A quoted dialogue line with its scanned fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogLine {
    pub fragments: Vec<Fragment>,
    /// The raw text between the quotes, unscanned.
    pub raw: String,
    /// Stable `^id` used to attach external metadata.
    pub line_id: Option<String>,
    pub loc: SourceLoc,
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// True for `<`, `<=`, `>`, `>=`.
    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    /// True for `+`, `-`, `*`, `/`.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A guard or value expression inside a `|...|` code block.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Unary {
        op: UnaryOp,
        rhs: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ident(String),
    Literal(Literal),
}

/// An `name = expr` statement, only legal as a run body.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
}

/// A parsed expression together with its raw source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub ast: Expr,
    pub raw: String,
}

/// A parsed assignment together with its raw source text.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub ast: Assignment,
    pub raw: String,
}

// =============================================================================
// Statements
// =============================================================================

/// Identity shared by every statement: node id, tags, and where the
/// statement starts.
///
/// The id is empty while the statement is being built; the parser
/// assigns generated ids before the AST leaves the front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMeta {
    pub id: String,
    pub tags: Vec<String>,
    pub loc: SourceLoc,
}

/// One option of a choice statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    /// Guard expression; the option is disabled while it is false.
    pub cond: Option<Expression>,
    pub line: DialogLine,
    pub dest: String,
}

/// A statement in a section body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `speaker: "line" -> @next`
    Say {
        speaker_id: String,
        line: DialogLine,
        next: Option<String>,
        meta: NodeMeta,
    },
    /// A block of consecutive `*` options presented together.
    Choice {
        options: Vec<ChoiceOption>,
        meta: NodeMeta,
    },
    /// `if |cond| -> @yes else @no`
    If {
        cond: Expression,
        true_dest: String,
        false_dest: Option<String>,
        meta: NodeMeta,
    },
    /// `run |name = expr|`
    Run { code: CodeBlock, meta: NodeMeta },
    /// `goto @dest`
    Goto { dest: String, meta: NodeMeta },
    /// `rand @a @b @c` picks a destination uniformly.
    Rand { dests: Vec<String>, meta: NodeMeta },
}

impl Node {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Node::Say { meta, .. }
            | Node::Choice { meta, .. }
            | Node::If { meta, .. }
            | Node::Run { meta, .. }
            | Node::Goto { meta, .. }
            | Node::Rand { meta, .. } => meta,
        }
    }

    pub(crate) fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Node::Say { meta, .. }
            | Node::Choice { meta, .. }
            | Node::If { meta, .. }
            | Node::Run { meta, .. }
            | Node::Goto { meta, .. }
            | Node::Rand { meta, .. } => meta,
        }
    }

    /// Dialogue lines carried by this statement, in display order.
    pub fn lines(&self) -> Vec<&DialogLine> {
        match self {
            Node::Say { line, .. } => vec![line],
            Node::Choice { options, .. } => options.iter().map(|o| &o.line).collect(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// A named entry point: `== name ==` followed by its statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub nodes: Vec<Node>,
    pub loc: SourceLoc,
}
