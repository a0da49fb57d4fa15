//! Compiled artifact model.
//!
//! The compiler produces an [`Artifact`] and the runtime consumes it;
//! sharing the types here keeps the runtime free of any front-end
//! dependency. The JSON layout is a stable contract: artifacts written
//! by one build stay loadable by later runtimes, and other runtimes
//! can parse the same file without this crate.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved destination that ends the running section.
pub const END_NODE: &str = "end";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid artifact {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),
}

// =============================================================================
// Values
// =============================================================================

/// Type of an environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
        }
    }
}

/// A runtime value. Serialized as a bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Interpolation formatting. Whole floats keep one decimal so a
    /// float variable is recognizable in rendered text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

// =============================================================================
// Environment
// =============================================================================

/// One declared variable, with its optional starting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// One declared markup tag. `parameter` carries the pattern its
/// parameter must match, for hosts that care.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub markup: Vec<MarkupSpec>,
}

// =============================================================================
// Expressions
// =============================================================================

/// A compiled expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompiledExpr {
    UnaryNot {
        rhs: Box<CompiledExpr>,
    },
    BinaryOr {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryAnd {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryLt {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryLe {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryEq {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryNe {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryGt {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryGe {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryAdd {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinarySub {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryMul {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    BinaryDiv {
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },
    Variable {
        name: String,
    },
    LiteralBool {
        value: bool,
    },
    LiteralInt {
        value: i64,
    },
    LiteralFloat {
        value: f64,
    },
    LiteralString {
        value: String,
    },
    Assign {
        name: String,
        value: Box<CompiledExpr>,
    },
}

// =============================================================================
// Lines
// =============================================================================

/// An open markup tag captured in a fragment's tag state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// One run of a compiled line: literal text or a variable reference,
/// with the markup open over it (outermost first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompiledFragment {
    Text {
        tags: Vec<MarkupState>,
        text: String,
    },
    Variable {
        tags: Vec<MarkupState>,
        variable: String,
    },
}

impl CompiledFragment {
    pub fn tags(&self) -> &[MarkupState] {
        match self {
            CompiledFragment::Text { tags, .. } => tags,
            CompiledFragment::Variable { tags, .. } => tags,
        }
    }
}

/// A compiled dialogue line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledLine {
    /// Stable id, or null when the script gave none.
    pub line_id: Option<String>,
    pub text: Vec<CompiledFragment>,
    /// External metadata folded in at compile time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<IndexMap<String, String>>,
}

// =============================================================================
// Nodes and Sections
// =============================================================================

/// One option of a compiled choice node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond: Option<CompiledExpr>,
    pub line: CompiledLine,
    pub dest: String,
}

/// The behavior of a compiled node. Every destination is resolved; the
/// runtime never falls through by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Say {
        speaker_id: String,
        line: CompiledLine,
        next: String,
    },
    Choice {
        options: Vec<CompiledOption>,
    },
    If {
        cond: CompiledExpr,
        true_dest: String,
        false_dest: String,
    },
    Run {
        code: CompiledExpr,
        next: String,
    },
    Goto {
        dest: String,
    },
    Rand {
        dests: Vec<String>,
    },
}

/// A compiled node: its tags plus its behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledNode {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// One compiled section, nodes keyed by id in script order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTable {
    pub source_file: String,
    pub start_node: String,
    pub nodes: IndexMap<String, CompiledNode>,
}

/// A source file that went into the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    pub hash: String,
}

// =============================================================================
// Artifact
// =============================================================================

/// The whole compiled project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Digest over the input hashes, in input order.
    pub build_id: String,
    /// Speakers in order of first appearance.
    pub speaker_ids: Vec<String>,
    pub sources: Vec<SourceInfo>,
    pub environment: EnvironmentSpec,
    pub sections: IndexMap<String, SectionTable>,
}

impl Artifact {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ArtifactError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ArtifactError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
