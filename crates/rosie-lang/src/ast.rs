//! Abstract syntax tree for RPL source.
//!
//! Every node carries the span of the source text it was parsed from, so
//! compiler diagnostics can point back into the original input. Trees are
//! immutable after parse; macro expansion builds new trees rather than
//! mutating.

use std::fmt;

use rosie_core::Span;

/// An expression with its source span.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Exp {
    pub kind: ExpKind,
    pub span: Span,
}

impl Exp {
    pub fn new(kind: ExpKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Zero-width predicate forms.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PredicateKind {
    /// `!e` — succeeds iff `e` fails.
    Negation,
    /// `&e` — succeeds iff `e` succeeds.
    Lookahead,
}

/// The expression variants.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExpKind {
    /// Exact byte string, escapes already decoded.
    Literal(Vec<u8>),
    /// Name lookup, optionally package-qualified (`pkg.name`).
    Ref {
        package: Option<String>,
        name: String,
    },
    /// Juxtaposition.
    Sequence(Vec<Exp>),
    /// Ordered alternatives, separated by `/`.
    Choice(Vec<Exp>),
    /// `!e` or `&e`.
    Predicate {
        kind: PredicateKind,
        exp: Box<Exp>,
    },
    /// `e*`, `e+`, `e?`, `e{n,m}`. `max = None` means unbounded.
    /// `cooked` records whether the quantified expression was a cooked
    /// group, which makes the repetition token-aware.
    Repetition {
        min: u32,
        max: Option<u32>,
        exp: Box<Exp>,
        cooked: bool,
    },
    /// `[:name:]`, optionally complemented.
    NamedSet { name: String, complement: bool },
    /// `[a-z]`, optionally complemented.
    Range { lo: u8, hi: u8, complement: bool },
    /// `[abc]`, optionally complemented.
    Charlist { chars: Vec<u8>, complement: bool },
    /// Bracketed union of charset forms: `[[:alpha:] [0-9]]`.
    SetUnion { items: Vec<Exp>, complement: bool },
    /// `( e )` — tokenized (boundary-inserting) group.
    Cooked(Box<Exp>),
    /// `{ e }` — raw group.
    Raw(Box<Exp>),
    /// Named capture. Produced by the compiler for bindings and by
    /// re-capture; has no direct surface syntax.
    Capture { name: String, exp: Box<Exp> },
    /// `grammar … end`: mutually recursive rules, first rule is the entry.
    Grammar { rules: Vec<Binding> },
    /// Macro or pfunction application: `name:exp` or `name(a, b)`.
    Application { name: String, args: Vec<Exp> },
    /// Placeholder left behind by parser error recovery.
    SyntaxError { message: String },
}

/// A top-level or grammar-rule binding.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Binding {
    pub name: String,
    pub exp: Exp,
    /// `alias` bindings name a pattern without producing a capture node.
    pub is_alias: bool,
    pub span: Span,
}

/// An `import path [as name]` statement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
    pub span: Span,
}

/// A parsed unit of RPL source.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    /// Declared `rpl M.m` version, if any.
    pub version: Option<(u32, u32)>,
    /// Declared `package P`, if any.
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub bindings: Vec<Binding>,
    /// Trailing expression, for REPL / compile-expression input.
    pub expression: Option<Exp>,
}

fn write_literal(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for &b in bytes {
        match b {
            b'"' => write!(f, "\\\"")?,
            b'\\' => write!(f, "\\\\")?,
            b'\n' => write!(f, "\\n")?,
            b'\t' => write!(f, "\\t")?,
            b'\r' => write!(f, "\\r")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\x{:02x}", b)?,
        }
    }
    write!(f, "\"")
}

fn write_set_byte(f: &mut fmt::Formatter<'_>, b: u8) -> fmt::Result {
    match b {
        b']' | b'[' | b'\\' | b'-' | b'^' => write!(f, "\\{}", b as char),
        0x21..=0x7e => write!(f, "{}", b as char),
        _ => write!(f, "\\x{:02x}", b),
    }
}

impl fmt::Display for Exp {
    /// Pretty-print back to RPL surface syntax. Re-parsing the output
    /// yields a structurally equal tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpKind::Literal(bytes) => write_literal(f, bytes),
            ExpKind::Ref { package, name } => match package {
                Some(pkg) => write!(f, "{}.{}", pkg, name),
                None => write!(f, "{}", name),
            },
            ExpKind::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            ExpKind::Choice(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " / ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            ExpKind::Predicate { kind, exp } => {
                let op = match kind {
                    PredicateKind::Negation => '!',
                    PredicateKind::Lookahead => '&',
                };
                write!(f, "{}{}", op, exp)
            }
            ExpKind::Repetition { min, max, exp, .. } => {
                write!(f, "{}", exp)?;
                match (min, max) {
                    (0, None) => write!(f, "*"),
                    (1, None) => write!(f, "+"),
                    (0, Some(1)) => write!(f, "?"),
                    (n, None) => write!(f, "{{{},}}", n),
                    (n, Some(m)) if n == m => write!(f, "{{{}}}", n),
                    (n, Some(m)) => write!(f, "{{{},{}}}", n, m),
                }
            }
            ExpKind::NamedSet { name, complement } => {
                if *complement {
                    write!(f, "[:^{}:]", name)
                } else {
                    write!(f, "[:{}:]", name)
                }
            }
            ExpKind::Range { lo, hi, complement } => {
                write!(f, "[")?;
                if *complement {
                    write!(f, "^")?;
                }
                write_set_byte(f, *lo)?;
                write!(f, "-")?;
                write_set_byte(f, *hi)?;
                write!(f, "]")
            }
            ExpKind::Charlist { chars, complement } => {
                write!(f, "[")?;
                if *complement {
                    write!(f, "^")?;
                }
                for &b in chars {
                    write_set_byte(f, b)?;
                }
                write!(f, "]")
            }
            ExpKind::SetUnion { items, complement } => {
                write!(f, "[")?;
                if *complement {
                    write!(f, "^")?;
                }
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ExpKind::Cooked(exp) => write!(f, "({})", exp),
            ExpKind::Raw(exp) => write!(f, "{{{}}}", exp),
            ExpKind::Capture { name, exp } => write!(f, "{}:({})", name, exp),
            ExpKind::Grammar { rules } => {
                write!(f, "grammar")?;
                for rule in rules {
                    write!(f, " ")?;
                    if rule.is_alias {
                        write!(f, "alias ")?;
                    }
                    write!(f, "{} = {}", rule.name, rule.exp)?;
                }
                write!(f, " end")
            }
            ExpKind::Application { name, args } => {
                if args.len() == 1 {
                    write!(f, "{}:{}", name, args[0])
                } else {
                    write!(f, "{}(", name)?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ")")
                }
            }
            ExpKind::SyntaxError { .. } => write!(f, "<error>"),
        }
    }
}
