//! Expression parser for `|...|` code blocks.
//!
//! Precedence, loosest first: `or`, `and`, `not`, the comparisons,
//! `+`/`-`, `*`/`/`. Comparisons do not chain; `a < b < c` is rejected.
//! Assignments are a separate entry point because they are only legal
//! as the whole body of a run statement.

use chumsky::prelude::*;

use crate::ast::{Assignment, BinaryOp, CodeBlock, Expr, Expression, Literal, UnaryOp};
use crate::parser::ParseError;

/// Whitespace inside a code block. Blocks are single-line, so newlines
/// never reach this parser.
fn ws<'src>() -> impl Parser<'src, &'src str, (), extra::Err<ParseError<'src>>> + Clone {
    one_of(" \t").repeated().ignored()
}

/// Parse an identifier, rejecting the expression keywords.
fn ident<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    text::ascii::ident().try_map(|s: &str, span| match s {
        "true" | "false" | "and" | "or" | "not" => {
            Err(Rich::custom(span, format!("'{s}' is a reserved word")))
        }
        _ => Ok(s.to_string()),
    })
}

/// Parse a string literal. No escapes; a quote cannot appear inside.
fn string_lit<'src>() -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone
{
    none_of('"')
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
}

/// Parse a number, keeping integers and floats distinct.
fn number<'src>() -> impl Parser<'src, &'src str, Literal, extra::Err<ParseError<'src>>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .then(
            one_of("eE")
                .then(one_of("+-").or_not())
                .then(text::digits(10))
                .or_not(),
        )
        .to_slice()
        .map(|s: &str| {
            if s.contains(['.', 'e', 'E']) {
                Literal::Float(s.parse().unwrap_or(0.0))
            } else {
                Literal::Int(s.parse().unwrap_or(0))
            }
        })
}

/// Expression parser.
fn expr<'src>() -> impl Parser<'src, &'src str, Expr, extra::Err<ParseError<'src>>> + Clone {
    recursive(|expr| {
        let atom = choice((
            text::keyword("true").to(Expr::Literal(Literal::Bool(true))),
            text::keyword("false").to(Expr::Literal(Literal::Bool(false))),
            number().map(Expr::Literal),
            string_lit().map(|s| Expr::Literal(Literal::Str(s))),
            ident().map(Expr::Ident),
            expr.clone()
                .padded_by(ws())
                .delimited_by(just('('), just(')')),
        ))
        .padded_by(ws());

        let product = atom.clone().foldl(
            choice((just('*').to(BinaryOp::Mul), just('/').to(BinaryOp::Div)))
                .padded_by(ws())
                .then(atom.clone())
                .repeated(),
            |lhs, (op, rhs)| Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        );

        let sum = product.clone().foldl(
            choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub)))
                .padded_by(ws())
                .then(product.clone())
                .repeated(),
            |lhs, (op, rhs)| Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        );

        let comparison = sum
            .clone()
            .then(
                choice((
                    just("<=").to(BinaryOp::Le),
                    just(">=").to(BinaryOp::Ge),
                    just("==").to(BinaryOp::Eq),
                    just("!=").to(BinaryOp::Ne),
                    just('<').to(BinaryOp::Lt),
                    just('>').to(BinaryOp::Gt),
                ))
                .padded_by(ws())
                .then(sum.clone())
                .or_not(),
            )
            .map(|(lhs, rest)| match rest {
                Some((op, rhs)) => Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                None => lhs,
            });

        let negation = text::keyword("not")
            .padded_by(ws())
            .repeated()
            .foldr(comparison, |_, rhs| Expr::Unary {
                op: UnaryOp::Not,
                rhs: Box::new(rhs),
            });

        let conjunction = negation.clone().foldl(
            text::keyword("and")
                .padded_by(ws())
                .to(BinaryOp::And)
                .then(negation.clone())
                .repeated(),
            |lhs, (op, rhs)| Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        );

        conjunction.clone().foldl(
            text::keyword("or")
                .padded_by(ws())
                .to(BinaryOp::Or)
                .then(conjunction.clone())
                .repeated(),
            |lhs, (op, rhs)| Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    })
}

/// Assignment parser: `name = expr`. The lookahead keeps `==` from
/// being read as an assignment of a malformed expression.
fn assignment<'src>() -> impl Parser<'src, &'src str, Assignment, extra::Err<ParseError<'src>>> + Clone
{
    ident()
        .padded_by(ws())
        .then_ignore(just('=').then_ignore(just('=').not()))
        .then(expr())
        .map(|(name, value)| Assignment { name, value })
}

fn first_message(errors: &[ParseError<'_>]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "invalid expression".to_string())
}

/// Parse the contents of a guard or value code block.
pub fn parse_expression(raw: &str) -> Result<Expression, String> {
    let (output, errors) = expr().then_ignore(end()).parse(raw).into_output_errors();
    match output {
        Some(ast) if errors.is_empty() => Ok(Expression {
            ast,
            raw: raw.to_string(),
        }),
        _ => Err(first_message(&errors)),
    }
}

/// Parse the contents of a run code block.
pub fn parse_assignment(raw: &str) -> Result<CodeBlock, String> {
    let (output, errors) = assignment()
        .then_ignore(end())
        .parse(raw)
        .into_output_errors();
    if let Some(ast) = output {
        if errors.is_empty() {
            return Ok(CodeBlock {
                ast,
                raw: raw.to_string(),
            });
        }
    }
    // A well-formed expression that just is not an assignment deserves
    // a better message than the raw parse failure.
    if parse_expression(raw).is_ok() {
        return Err("code block must be an assignment".to_string());
    }
    Err(first_message(&errors))
}
