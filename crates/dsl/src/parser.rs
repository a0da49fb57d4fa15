//! Parser for Banter scripts.
//!
//! Chumsky directly over the source text. The grammar is line
//! oriented: statements end at a newline (or a `//` comment running to
//! one), metadata may sit on its own line or prefix a statement, and a
//! blank line between `*` options splits a choice block in two.

use std::collections::HashSet;
use std::path::Path;

use chumsky::prelude::*;
use rand::Rng;

use crate::ast::{ChoiceOption, DialogLine, Expression, Node, NodeMeta, Section};
use crate::diag::{loc_at, Diagnostic, SourceLoc};
use crate::expr::{parse_assignment, parse_expression};
use crate::text::parse_text;

/// Parse error type
pub type ParseError<'src> = Rich<'src, char>;

/// Parse one script into its sections.
pub fn parse(source: &str) -> (Option<Vec<Section>>, Vec<ParseError<'_>>) {
    script(source).parse(source).into_output_errors()
}

/// Parse a file, reporting failures as positioned diagnostics.
///
/// Returns `None` when the file failed to parse so the rest of the
/// project can still be analyzed. On success every statement has an
/// id, generated where the script gave none.
pub fn parse_source(
    path: &Path,
    source: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<Section>> {
    let (output, errors) = parse(source);
    if !errors.is_empty() {
        for err in &errors {
            diagnostics.push(Diagnostic::error(
                path,
                loc_at(source, err.span().start),
                err.to_string(),
            ));
        }
        return None;
    }
    let mut sections = output?;
    assign_node_ids(&mut sections);
    Some(sections)
}

// =============================================================================
// Helper Combinators
// =============================================================================

/// Inline whitespace. Newlines terminate statements, so they are never
/// skipped here.
fn iws<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    one_of(" \t").repeated().ignored()
}

/// A `//` comment running to the end of the line.
fn line_comment<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored()
}

/// Blank lines (possibly holding comments) between statements.
fn trivia<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    iws()
        .then(line_comment().or_not())
        .then(just('\n'))
        .repeated()
        .ignored()
}

/// End of a statement: optional trailing comment, then a newline or
/// the end of the file.
fn stmt_end<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    iws()
        .then(line_comment().or_not())
        .then(just('\n').ignored().or(end()))
        .ignored()
}

/// Parse an identifier
fn ident<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    text::ascii::ident().map(|s: &str| s.to_string())
}

/// Parse a speaker identifier. Statement keywords cannot name a
/// speaker.
fn speaker<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    text::ascii::ident().try_map(|s: &str, span| match s {
        "if" | "else" | "run" | "goto" | "rand" => Err(Rich::custom(
            span,
            format!("'{s}' is a keyword and cannot be a speaker id"),
        )),
        _ => Ok(s.to_string()),
    })
}

/// Parse a `@name` node reference.
fn node_ref<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    just('@').ignore_then(ident())
}

/// Parse the raw contents of a `|...|` code block.
fn code_block<'src>(
) -> impl Parser<'src, &'src str, &'src str, extra::Err<ParseError<'src>>> + Clone {
    none_of("|\n")
        .repeated()
        .to_slice()
        .delimited_by(just('|'), just('|'))
}

/// Parse a code block holding a guard or value expression.
fn expr_block<'src>() -> impl Parser<'src, &'src str, Expression, extra::Err<ParseError<'src>>> + Clone
{
    code_block().try_map(|raw, span| parse_expression(raw).map_err(|msg| Rich::custom(span, msg)))
}

/// Parse a quoted dialogue line with optional `^line_id`.
fn dialog_line<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, DialogLine, extra::Err<ParseError<'src>>> + Clone {
    let quoted = none_of("\"\n")
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'));

    quoted
        .try_map(|raw: &str, span| {
            parse_text(raw)
                .map(|fragments| (raw, fragments, span))
                .map_err(|e| Rich::custom(span, e.to_string()))
        })
        .then(iws().ignore_then(just('^')).ignore_then(ident()).or_not())
        .map(move |((raw, fragments, span), line_id)| DialogLine {
            fragments,
            raw: raw.to_string(),
            line_id,
            loc: loc_at(src, span.start),
        })
}

/// Parse an explicit `-> @dest` arrow.
fn arrow<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    just("->").ignore_then(iws()).ignore_then(node_ref())
}

fn empty_meta() -> NodeMeta {
    NodeMeta {
        id: String::new(),
        tags: Vec::new(),
        loc: SourceLoc::default(),
    }
}

// =============================================================================
// Statements
// =============================================================================

/// Parse a `speaker: "line" -> @next` statement.
fn say_stmt<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    speaker()
        .then_ignore(iws().then(just(':')).then(iws()))
        .then(dialog_line(src))
        .then(iws().ignore_then(arrow()).or_not())
        .map(|((speaker_id, line), next)| Node::Say {
            speaker_id,
            line,
            next,
            meta: empty_meta(),
        })
}

/// Parse one `* |guard| "text" -> @dest` option line.
fn choice_option<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, ChoiceOption, extra::Err<ParseError<'src>>> + Clone {
    just('*')
        .ignore_then(iws())
        .ignore_then(expr_block().then_ignore(iws()).or_not())
        .then(dialog_line(src))
        .then(iws().ignore_then(arrow()))
        .map(|((cond, line), dest)| ChoiceOption { cond, line, dest })
}

/// Newline between two options of the same block. Comment lines are
/// allowed in between; a blank line ends the block.
fn option_sep<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    iws()
        .then(line_comment().or_not())
        .then(just('\n'))
        .then(iws().then(line_comment()).then(just('\n')).repeated())
        .then(iws())
        .ignored()
}

/// Parse consecutive option lines as a single choice statement.
fn choice_stmt<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    choice_option(src)
        .separated_by(option_sep())
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|options| Node::Choice {
            options,
            meta: empty_meta(),
        })
}

/// Parse an `if |cond| -> @true else @false` statement.
fn if_stmt<'src>() -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    text::keyword("if")
        .ignore_then(iws())
        .ignore_then(expr_block())
        .then_ignore(iws())
        .then(arrow())
        .then(
            iws()
                .ignore_then(text::keyword("else"))
                .ignore_then(iws())
                .ignore_then(node_ref())
                .or_not(),
        )
        .map(|((cond, true_dest), false_dest)| Node::If {
            cond,
            true_dest,
            false_dest,
            meta: empty_meta(),
        })
}

/// Parse a `run |name = expr|` statement.
fn run_stmt<'src>() -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    text::keyword("run")
        .ignore_then(iws())
        .ignore_then(
            code_block()
                .try_map(|raw, span| parse_assignment(raw).map_err(|msg| Rich::custom(span, msg))),
        )
        .map(|code| Node::Run {
            code,
            meta: empty_meta(),
        })
}

/// Parse a `goto @dest` statement.
fn goto_stmt<'src>() -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    text::keyword("goto")
        .ignore_then(iws())
        .ignore_then(node_ref())
        .map(|dest| Node::Goto {
            dest,
            meta: empty_meta(),
        })
}

/// Parse a `rand @a @b ...` statement.
fn rand_stmt<'src>() -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    text::keyword("rand")
        .ignore_then(
            iws()
                .ignore_then(node_ref())
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|dests| Node::Rand {
            dests,
            meta: empty_meta(),
        })
}

/// Parse a `@id #tag` metadata prefix, inline or on its own line.
fn meta_prefix<'src>(
) -> impl Parser<'src, &'src str, (Option<String>, Vec<String>), extra::Err<ParseError<'src>>> + Clone
{
    let tag = just('#').ignore_then(ident());

    let with_id = node_ref()
        .then(iws().ignore_then(tag.clone()).repeated().collect::<Vec<_>>())
        .map(|(id, tags)| (Some(id), tags));

    let tags_only = tag
        .clone()
        .then(iws().ignore_then(tag).repeated().collect::<Vec<_>>())
        .map(|(first, rest)| {
            let mut tags = vec![first];
            tags.extend(rest);
            (None, tags)
        });

    // Metadata either shares the statement's line or ends its own.
    let sep = choice((
        iws()
            .then(line_comment().or_not())
            .then(just('\n'))
            .then(trivia())
            .ignored(),
        iws().ignored(),
    ));

    choice((with_id, tags_only)).then_ignore(sep)
}

/// Parse any statement, attaching its metadata prefix.
fn statement<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, Node, extra::Err<ParseError<'src>>> + Clone {
    let body = choice((
        choice_stmt(src),
        if_stmt(),
        run_stmt(),
        goto_stmt(),
        rand_stmt(),
        say_stmt(src),
    ));

    meta_prefix()
        .or_not()
        .then(body)
        .map_with(move |(meta, mut node), e| {
            {
                let m = node.meta_mut();
                m.loc = loc_at(src, e.span().start);
                if let Some((id, tags)) = meta {
                    if let Some(id) = id {
                        m.id = id;
                    }
                    m.tags = tags;
                }
            }
            node
        })
}

// =============================================================================
// Sections
// =============================================================================

/// Parse a `== name ==` header and the statements that follow it.
fn section<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, Section, extra::Err<ParseError<'src>>> + Clone {
    just("==")
        .ignore_then(iws())
        .ignore_then(ident())
        .then_ignore(iws())
        .then_ignore(just("=="))
        .then_ignore(stmt_end())
        .then_ignore(trivia())
        .then(
            statement(src)
                .then_ignore(stmt_end())
                .then_ignore(trivia())
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(move |(name, nodes), e| Section {
            name,
            nodes,
            loc: loc_at(src, e.span().start),
        })
}

/// Parse a whole file.
fn script<'src>(
    src: &'src str,
) -> impl Parser<'src, &'src str, Vec<Section>, extra::Err<ParseError<'src>>> {
    trivia()
        .ignore_then(section(src).repeated().collect::<Vec<_>>())
        .then_ignore(iws())
        .then_ignore(line_comment().or_not())
        .then_ignore(end())
}

// =============================================================================
// Node Ids
// =============================================================================

const GENERATED_ID_LEN: usize = 8;
const GENERATED_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Give every statement without an explicit `@id` a generated one,
/// unique within its section. `end` is never handed out.
pub fn assign_node_ids(sections: &mut [Section]) {
    let mut rng = rand::thread_rng();
    for section in sections {
        let mut used: HashSet<String> = section
            .nodes
            .iter()
            .map(|n| n.meta().id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        used.insert("end".to_string());
        for node in &mut section.nodes {
            if node.meta().id.is_empty() {
                let id = generate_id(&mut rng, &used);
                used.insert(id.clone());
                node.meta_mut().id = id;
            }
        }
    }
}

fn generate_id(rng: &mut impl Rng, used: &HashSet<String>) -> String {
    loop {
        let id: String = (0..GENERATED_ID_LEN)
            .map(|_| {
                let i = rng.gen_range(0..GENERATED_ID_ALPHABET.len());
                GENERATED_ID_ALPHABET[i] as char
            })
            .collect();
        if !used.contains(&id) {
            return id;
        }
    }
}
