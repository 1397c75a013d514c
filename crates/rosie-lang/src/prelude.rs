//! The built-in environment shared by every engine.
//!
//! The prelude is constructed once, frozen, and handed out as an `Arc`;
//! engines chain their root scope to it and can shadow but never mutate
//! it. It provides:
//! - the patterns `.` (one UTF-8 character), `^`, `$`, `~` (token
//!   boundary), and `halt`
//! - the macros `find`, `findall`, `keepto`, and `ci`
//! - the pfunctions `message` and `error`

use std::sync::{Arc, OnceLock};

use rosie_core::{Diagnostic, ErrorCode, Span};
use rosie_peg::charset::named_class;
use rosie_peg::{ByteSet, Pattern};

use crate::ast::{Binding, Exp, ExpKind, PredicateKind};
use crate::env::{EnvValue, Environment, PatternValue};

static PRELUDE: OnceLock<Arc<Environment>> = OnceLock::new();

/// The shared read-only prelude environment.
pub fn prelude() -> Arc<Environment> {
    PRELUDE
        .get_or_init(|| {
            let mut env = Environment::new();
            let bind_pattern = |env: &mut Environment, name: &str, pat: Pattern| {
                env.bind(
                    name,
                    EnvValue::Pattern(PatternValue {
                        pat,
                        uncaptured: None,
                        alias: true,
                    }),
                    true,
                )
                .expect("prelude scope is mutable during construction");
            };

            bind_pattern(&mut env, ".", utf8_char());
            bind_pattern(&mut env, "^", Pattern::AtStart);
            bind_pattern(&mut env, "$", Pattern::AtEnd);
            bind_pattern(&mut env, "~", boundary());
            bind_pattern(&mut env, "halt", Pattern::Halt);

            for (name, op) in [
                ("find", expand_find as crate::env::MacroOp),
                ("findall", expand_findall),
                ("keepto", expand_keepto),
                ("ci", expand_ci),
            ] {
                env.bind(name, EnvValue::Macro(op), true)
                    .expect("prelude scope is mutable during construction");
            }
            for (name, op) in [
                ("message", pf_message as crate::env::PrimOp),
                ("error", pf_error),
            ] {
                env.bind(name, EnvValue::PFunction(op), true)
                    .expect("prelude scope is mutable during construction");
            }

            Arc::new(env.freeze())
        })
        .clone()
}

fn class(name: &str) -> ByteSet {
    named_class(name).expect("ASCII locale class exists")
}

/// One UTF-8 encoded character (1-4 bytes).
fn utf8_char() -> Pattern {
    let cont = || Pattern::Set(ByteSet::range(0x80, 0xbf));
    Pattern::Choice(vec![
        Pattern::Set(ByteSet::range(0x00, 0x7f)),
        Pattern::Seq(vec![Pattern::Set(ByteSet::range(0xc0, 0xdf)), cont()]),
        Pattern::Seq(vec![
            Pattern::Set(ByteSet::range(0xe0, 0xef)),
            cont(),
            cont(),
        ]),
        Pattern::Seq(vec![
            Pattern::Set(ByteSet::range(0xf0, 0xf7)),
            cont(),
            cont(),
            cont(),
        ]),
    ])
}

/// The token boundary `~`: whitespace, a word edge, either side of
/// punctuation, or an input edge.
pub(crate) fn boundary() -> Pattern {
    let word = || Pattern::Set(class("alnum"));
    let punct = || Pattern::Set(class("punct"));
    Pattern::Choice(vec![
        Pattern::Repeat {
            pat: Box::new(Pattern::Set(class("space"))),
            min: 1,
            max: None,
        },
        // Word start: a word byte ahead, none behind
        Pattern::Seq(vec![
            Pattern::Lookahead(Box::new(word())),
            Pattern::Negation(Box::new(Pattern::Behind(Box::new(word())))),
        ]),
        // Word end: a word byte behind, none ahead
        Pattern::Seq(vec![
            Pattern::Behind(Box::new(word())),
            Pattern::Negation(Box::new(word())),
        ]),
        Pattern::Lookahead(Box::new(punct())),
        Pattern::Behind(Box::new(punct())),
        Pattern::AtEnd,
        Pattern::AtStart,
    ])
}

// ----------------------------------------------------------------------
// Macros (pure AST -> AST, run before compilation)
// ----------------------------------------------------------------------

fn one_arg<'a>(name: &str, args: &'a [Exp], span: Span) -> Result<&'a Exp, Diagnostic> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Diagnostic::error(ErrorCode::E001, span)
            .with_message(format!("{} takes exactly one argument", name))),
    }
}

fn ref_to(name: &str, span: Span) -> Exp {
    Exp::new(
        ExpKind::Ref {
            package: None,
            name: name.into(),
        },
        span,
    )
}

fn raw_seq(items: Vec<Exp>, span: Span) -> Exp {
    Exp::new(
        ExpKind::Raw(Box::new(Exp::new(ExpKind::Sequence(items), span))),
        span,
    )
}

/// `find(E)` expands to:
///
/// ```text
/// grammar
///   alias find = {search E}
///   alias search = {!E .}*
/// end
/// ```
///
/// Both rules are aliases, so only `E`'s own captures surface.
fn find_grammar(e: Exp, span: Span, capture_skip: bool) -> Exp {
    let not_e = Exp::new(
        ExpKind::Predicate {
            kind: PredicateKind::Negation,
            exp: Box::new(e.clone()),
        },
        span,
    );
    let search_body = Exp::new(
        ExpKind::Repetition {
            min: 0,
            max: None,
            cooked: false,
            exp: Box::new(raw_seq(vec![not_e, ref_to(".", span)], span)),
        },
        span,
    );
    let find_body = raw_seq(vec![ref_to("search", span), e], span);
    Exp::new(
        ExpKind::Grammar {
            rules: vec![
                Binding {
                    name: "find".into(),
                    exp: find_body,
                    is_alias: true,
                    span,
                },
                Binding {
                    name: "search".into(),
                    exp: search_body,
                    is_alias: !capture_skip,
                    span,
                },
            ],
        },
        span,
    )
}

fn expand_find(args: &[Exp], span: Span) -> Result<Exp, Diagnostic> {
    let e = one_arg("find", args, span)?;
    Ok(find_grammar(e.clone(), span, false))
}

/// `findall(E)` is `{find(E)}+`, raw so no boundary is inserted between
/// the finds.
fn expand_findall(args: &[Exp], span: Span) -> Result<Exp, Diagnostic> {
    let e = one_arg("findall", args, span)?;
    Ok(Exp::new(
        ExpKind::Repetition {
            min: 1,
            max: None,
            cooked: false,
            exp: Box::new(Exp::new(
                ExpKind::Raw(Box::new(find_grammar(e.clone(), span, false))),
                span,
            )),
        },
        span,
    ))
}

/// `keepto(E)`: like `find`, but the skipped prefix is captured (as
/// `search`).
fn expand_keepto(args: &[Exp], span: Span) -> Result<Exp, Diagnostic> {
    let e = one_arg("keepto", args, span)?;
    Ok(find_grammar(e.clone(), span, true))
}

/// `ci(E)`: rewrite every literal byte in `E` to accept either case.
fn expand_ci(args: &[Exp], span: Span) -> Result<Exp, Diagnostic> {
    let e = one_arg("ci", args, span)?;
    Ok(ci_rewrite(e))
}

fn ci_rewrite(exp: &Exp) -> Exp {
    let span = exp.span;
    let kind = match &exp.kind {
        ExpKind::Literal(bytes) => return ci_literal(bytes, span),
        ExpKind::Sequence(items) => ExpKind::Sequence(items.iter().map(ci_rewrite).collect()),
        ExpKind::Choice(items) => ExpKind::Choice(items.iter().map(ci_rewrite).collect()),
        ExpKind::Predicate { kind, exp } => ExpKind::Predicate {
            kind: *kind,
            exp: Box::new(ci_rewrite(exp)),
        },
        ExpKind::Repetition {
            min,
            max,
            exp,
            cooked,
        } => ExpKind::Repetition {
            min: *min,
            max: *max,
            cooked: *cooked,
            exp: Box::new(ci_rewrite(exp)),
        },
        ExpKind::Cooked(exp) => ExpKind::Cooked(Box::new(ci_rewrite(exp))),
        ExpKind::Raw(exp) => ExpKind::Raw(Box::new(ci_rewrite(exp))),
        ExpKind::Capture { name, exp } => ExpKind::Capture {
            name: name.clone(),
            exp: Box::new(ci_rewrite(exp)),
        },
        ExpKind::Grammar { rules } => ExpKind::Grammar {
            rules: rules
                .iter()
                .map(|rule| Binding {
                    name: rule.name.clone(),
                    exp: ci_rewrite(&rule.exp),
                    is_alias: rule.is_alias,
                    span: rule.span,
                })
                .collect(),
        },
        ExpKind::Application { name, args } => ExpKind::Application {
            name: name.clone(),
            args: args.iter().map(ci_rewrite).collect(),
        },
        // Charsets, refs, and errors pass through unchanged
        other => other.clone(),
    };
    Exp::new(kind, span)
}

fn ci_literal(bytes: &[u8], span: Span) -> Exp {
    let mut items: Vec<Exp> = Vec::new();
    let mut run: Vec<u8> = Vec::new();
    for &b in bytes {
        if b.is_ascii_alphabetic() {
            if !run.is_empty() {
                items.push(Exp::new(ExpKind::Literal(std::mem::take(&mut run)), span));
            }
            items.push(Exp::new(
                ExpKind::Charlist {
                    chars: vec![b.to_ascii_lowercase(), b.to_ascii_uppercase()],
                    complement: false,
                },
                span,
            ));
        } else {
            run.push(b);
        }
    }
    if !run.is_empty() {
        items.push(Exp::new(ExpKind::Literal(run), span));
    }
    match items.len() {
        0 => Exp::new(ExpKind::Literal(Vec::new()), span),
        1 => items.pop().unwrap(),
        _ => raw_seq(items, span),
    }
}

// ----------------------------------------------------------------------
// Pfunctions (args -> matcher)
// ----------------------------------------------------------------------

fn literal_args(
    name: &str,
    args: &[Exp],
    span: Span,
) -> Result<(String, Option<String>), Diagnostic> {
    let as_text = |exp: &Exp| -> Result<String, Diagnostic> {
        match &exp.kind {
            ExpKind::Literal(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => Err(Diagnostic::error(ErrorCode::E001, exp.span)
                .with_message(format!("{} expects string literal arguments", name))),
        }
    };
    match args {
        [text] => Ok((as_text(text)?, None)),
        [text, tag] => Ok((as_text(text)?, Some(as_text(tag)?))),
        _ => Err(Diagnostic::error(ErrorCode::E001, span)
            .with_message(format!("{} takes one or two arguments", name))),
    }
}

/// `message(s, tag?)`: zero-width, emits a labeled node carrying `s`.
fn pf_message(args: &[Exp], span: Span) -> Result<Pattern, Diagnostic> {
    let (text, tag) = literal_args("message", args, span)?;
    Ok(Pattern::Constant {
        name: tag.unwrap_or_else(|| "message".into()),
        text,
    })
}

/// `error(s, tag?)`: `message` then halt.
fn pf_error(args: &[Exp], span: Span) -> Result<Pattern, Diagnostic> {
    let (text, tag) = literal_args("error", args, span)?;
    Ok(Pattern::Seq(vec![
        Pattern::Constant {
            name: tag.unwrap_or_else(|| "error".into()),
            text,
        },
        Pattern::Halt,
    ]))
}
