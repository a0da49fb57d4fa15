//! Diagnostics for parse and analysis problems.
//!
//! Every problem found in a script is reported as a [`Diagnostic`]
//! carrying a severity, the offending file, and a 1-based source
//! location. Analysis never stops at the first problem; callers
//! collect the full list and decide what to do with it.

use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Severity
// =============================================================================

/// How bad a diagnostic is.
///
/// Warnings leave the project compilable; errors reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Source locations
// =============================================================================

/// A 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub line: usize,
    pub column: usize,
}

impl SourceLoc {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Convert a byte offset into a 1-based line/column position.
///
/// Columns count bytes from the last newline. Offsets past the end of
/// the source clamp to the final position.
pub fn loc_at(source: &str, offset: usize) -> SourceLoc {
    let offset = offset.min(source.len());
    let prefix = &source[..offset];
    let line = prefix.matches('\n').count() + 1;
    let line_start = prefix.rfind('\n').map(|p| p + 1).unwrap_or(0);
    SourceLoc::new(line, offset - line_start + 1)
}

// =============================================================================
// Diagnostics
// =============================================================================

/// A single problem found in a script or project.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub loc: SourceLoc,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: impl Into<PathBuf>, loc: SourceLoc, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: file.into(),
            loc,
            message: message.into(),
        }
    }

    pub fn warning(file: impl Into<PathBuf>, loc: SourceLoc, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            file: file.into(),
            loc,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}: {}",
            self.severity,
            self.file.display(),
            self.loc,
            self.message
        )
    }
}

/// True when any diagnostic in the list is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_at_start_of_source() {
        assert_eq!(loc_at("hello", 0), SourceLoc::new(1, 1));
    }

    #[test]
    fn loc_at_counts_lines_and_columns() {
        let src = "one\ntwo\nthree";
        assert_eq!(loc_at(src, 4), SourceLoc::new(2, 1));
        assert_eq!(loc_at(src, 6), SourceLoc::new(2, 3));
        assert_eq!(loc_at(src, 8), SourceLoc::new(3, 1));
    }

    #[test]
    fn loc_at_clamps_past_end() {
        assert_eq!(loc_at("ab\ncd", 999), SourceLoc::new(2, 3));
    }

    #[test]
    fn diagnostic_display_format() {
        let d = Diagnostic::error("scripts/town.btr", SourceLoc::new(3, 14), "Invalid node id: x");
        assert_eq!(
            d.to_string(),
            "error scripts/town.btr:3:14: Invalid node id: x"
        );
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let warn = Diagnostic::warning("a.btr", SourceLoc::new(1, 1), "Unreachable node");
        assert!(!has_errors(&[warn.clone()]));
        let err = Diagnostic::error("a.btr", SourceLoc::new(1, 1), "Duplicate node id: x");
        assert!(has_errors(&[warn, err]));
    }
}
