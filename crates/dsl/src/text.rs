//! Scanner for the dialogue text micro-grammar.
//!
//! Quoted dialogue is not plain text: `{name}` interpolates a variable,
//! `[name]` and `[name:param]` open a markup tag, `[/name]` closes one,
//! and `[[` / `{{` escape the bracket characters. Everything else is
//! literal display text.

use thiserror::Error;

use crate::ast::Fragment;

/// A malformed dialogue line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("unmatched '[' at column {0}")]
    UnmatchedBracket(usize),
    #[error("unmatched '{{' at column {0}")]
    UnmatchedBrace(usize),
}

/// Scan one dialogue line into fragments.
///
/// Adjacent literal runs are coalesced, so escapes never split the
/// surrounding text into separate fragments.
pub fn parse_text(text: &str) -> Result<Vec<Fragment>, TextError> {
    let mut fragments: Vec<Fragment> = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if bytes.get(i + 1) == Some(&b'[') {
                    push_text(&mut fragments, "[");
                    i += 2;
                } else {
                    let close = find_from(text, i + 1, ']')
                        .ok_or(TextError::UnmatchedBracket(i + 1))?;
                    let inner = &text[i + 1..close];
                    if let Some(name) = inner.strip_prefix('/') {
                        fragments.push(Fragment::TagClose {
                            name: name.to_string(),
                        });
                    } else {
                        // Only the first ':' separates name from parameter.
                        let (name, parameter) = match inner.split_once(':') {
                            Some((name, param)) => (name, Some(param.to_string())),
                            None => (inner, None),
                        };
                        fragments.push(Fragment::TagOpen {
                            name: name.to_string(),
                            parameter,
                        });
                    }
                    i = close + 1;
                }
            }
            b'{' => {
                if bytes.get(i + 1) == Some(&b'{') {
                    push_text(&mut fragments, "{");
                    i += 2;
                } else {
                    let close =
                        find_from(text, i + 1, '}').ok_or(TextError::UnmatchedBrace(i + 1))?;
                    fragments.push(Fragment::Variable(text[i + 1..close].to_string()));
                    i = close + 1;
                }
            }
            _ => {
                let end = text[i..]
                    .find(['[', '{'])
                    .map(|p| p + i)
                    .unwrap_or(text.len());
                push_text(&mut fragments, &text[i..end]);
                i = end;
            }
        }
    }

    Ok(fragments)
}

fn find_from(text: &str, start: usize, needle: char) -> Option<usize> {
    text[start..].find(needle).map(|p| p + start)
}

fn push_text(fragments: &mut Vec<Fragment>, text: &str) {
    if let Some(Fragment::Text(last)) = fragments.last_mut() {
        last.push_str(text);
    } else {
        fragments.push(Fragment::Text(text.to_string()));
    }
}

// =============================================================================
// Tag stack
// =============================================================================

/// Ordered stack of currently open markup tags.
///
/// Both the analyzer's balance check and the compiler's fragment
/// emission walk a line through one of these; only the analyzer cares
/// about the return value of [`TagStack::close`].
#[derive(Debug, Clone, Default)]
pub struct TagStack {
    open: Vec<(String, Option<String>)>,
}

impl TagStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, name: &str, parameter: Option<&str>) {
        self.open
            .push((name.to_string(), parameter.map(|p| p.to_string())));
    }

    /// Pop the innermost tag. Returns false when the close does not
    /// match the innermost open tag, or nothing is open.
    pub fn close(&mut self, name: &str) -> bool {
        match self.open.last() {
            Some((top, _)) if top == name => {
                self.open.pop();
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Outermost-first view of the open tags.
    pub fn snapshot(&self) -> &[(String, Option<String>)] {
        &self.open
    }

    /// Names of the open tags, outermost first.
    pub fn open_names(&self) -> Vec<String> {
        self.open.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.to_string())
    }

    #[test]
    fn plain_text_is_one_fragment() {
        assert_eq!(parse_text("Hello there.").unwrap(), vec![text("Hello there.")]);
    }

    #[test]
    fn empty_line_has_no_fragments() {
        assert_eq!(parse_text("").unwrap(), Vec::new());
    }

    #[test]
    fn variable_interpolation() {
        assert_eq!(
            parse_text("You have {coins} coins").unwrap(),
            vec![
                text("You have "),
                Fragment::Variable("coins".to_string()),
                text(" coins"),
            ]
        );
    }

    #[test]
    fn markup_tags_with_and_without_parameter() {
        assert_eq!(
            parse_text("[b]Hi[/b] [color:red]!").unwrap(),
            vec![
                Fragment::TagOpen {
                    name: "b".to_string(),
                    parameter: None,
                },
                text("Hi"),
                Fragment::TagClose {
                    name: "b".to_string(),
                },
                text(" "),
                Fragment::TagOpen {
                    name: "color".to_string(),
                    parameter: Some("red".to_string()),
                },
                text("!"),
            ]
        );
    }

    #[test]
    fn parameter_keeps_later_colons() {
        assert_eq!(
            parse_text("[img:icons:chest]").unwrap(),
            vec![Fragment::TagOpen {
                name: "img".to_string(),
                parameter: Some("icons:chest".to_string()),
            }]
        );
    }

    #[test]
    fn escapes_coalesce_into_surrounding_text() {
        assert_eq!(
            parse_text("a [[literal]] {{brace").unwrap(),
            vec![text("a [literal]] {brace")]
        );
    }

    #[test]
    fn unmatched_open_bracket_is_an_error() {
        assert_eq!(parse_text("oops [b"), Err(TextError::UnmatchedBracket(6)));
        assert_eq!(parse_text("tail ["), Err(TextError::UnmatchedBracket(6)));
    }

    #[test]
    fn unmatched_open_brace_is_an_error() {
        assert_eq!(parse_text("{coins"), Err(TextError::UnmatchedBrace(1)));
    }

    #[test]
    fn lone_close_bracket_is_literal() {
        assert_eq!(parse_text("a ] b").unwrap(), vec![text("a ] b")]);
    }

    #[test]
    fn tag_stack_matches_innermost() {
        let mut stack = TagStack::new();
        stack.open("b", None);
        stack.open("color", Some("red"));
        assert!(!stack.close("b"));
        assert!(stack.close("color"));
        assert!(stack.close("b"));
        assert!(stack.is_empty());
    }

    #[test]
    fn tag_stack_snapshot_is_outermost_first() {
        let mut stack = TagStack::new();
        stack.open("b", None);
        stack.open("color", Some("red"));
        assert_eq!(
            stack.snapshot(),
            &[
                ("b".to_string(), None),
                ("color".to_string(), Some("red".to_string())),
            ]
        );
        assert_eq!(stack.open_names(), vec!["b", "color"]);
    }
}
