//! The result-collecting compiler.
//!
//! Each binding is lowered independently; a failed binding records its
//! diagnostics and is skipped, and compilation continues so one pass can
//! surface several problems. Nothing here panics on bad input.
//!
//! Cooked/raw handling lives here, not in the parser: in cooked mode the
//! boundary matcher `~` is spliced between the siblings of sequences and
//! into cooked repetitions; raw mode concatenates directly.
//!
//! Grammars are compiled into a single flat rule table per binding: rule
//! names are forward-bound to `Call` indices before any right-hand side is
//! compiled, so mutual recursion is legal, and a grammar produced by macro
//! expansion inside another grammar's rule is merged into the same table
//! so cross-references keep working.

use std::collections::HashMap;

use rosie_core::{any_errors, Diagnostic, ErrorCode, Span};
use rosie_peg::charset::named_class;
use rosie_peg::{verify_grammar, ByteSet, Pattern, Rule};

use crate::ast::{Binding, Exp, ExpKind, PredicateKind, Program};
use crate::env::{EnvValue, Environment, MacroOp, PatternValue, PrimOp};
use crate::prelude;

/// Result of compiling a block of bindings.
#[derive(Debug)]
pub struct CompileResult {
    /// The `package` declaration, if the source had one.
    pub pkgname: Option<String>,
    /// Names successfully bound, in order.
    pub bound: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// False if any error-severity diagnostic was produced.
    pub success: bool,
}

/// Compile every binding of `program` into `env`. Bindings that fail are
/// not entered; later bindings still compile against the names that
/// succeeded.
pub fn compile_block(program: &Program, env: &mut Environment) -> CompileResult {
    let mut diagnostics = Vec::new();
    let mut bound = Vec::new();

    for binding in &program.bindings {
        let mut compiler = Compiler::new(env);
        let value = compiler.compile_binding(binding);
        let binding_diags = compiler.finish();
        let had_errors = any_errors(&binding_diags);
        diagnostics.extend(binding_diags);

        if let (Some(value), false) = (value, had_errors) {
            log::debug!("bound pattern \"{}\"", binding.name);
            if env.bind(&binding.name, EnvValue::Pattern(value), true).is_err() {
                diagnostics.push(
                    Diagnostic::error(ErrorCode::E203, binding.span)
                        .with_message("cannot bind into a read-only scope"),
                );
            } else {
                bound.push(binding.name.clone());
            }
        }
    }

    let success = !any_errors(&diagnostics);
    CompileResult {
        pkgname: program.package.clone(),
        bound,
        diagnostics,
        success,
    }
}

/// Compile a standalone expression against `env`. The result is wrapped
/// in an anonymous `*` capture unless it already produces a labeled node.
pub fn compile_expression(exp: &Exp, env: &Environment) -> (Option<Pattern>, Vec<Diagnostic>) {
    let mut compiler = Compiler::new(env);
    let pat = compiler.compile_exp(exp, Mode::Cooked);
    let diagnostics = compiler.finish();
    let pat = pat.map(|pat| match pat {
        labeled @ (Pattern::Capture { .. } | Pattern::Grammar { .. }) => labeled,
        other => Pattern::Capture {
            name: "*".into(),
            pat: Box::new(other),
        },
    });
    (pat, diagnostics)
}

/// Tokenization mode, switched by `(…)` and `{…}` groups.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Cooked,
    Raw,
}

/// Rule table under construction for the current grammar binding.
struct GrammarCtx {
    rules: Vec<Rule>,
    failed: bool,
}

struct Compiler<'a> {
    env: &'a Environment,
    /// Forward-declared grammar rule names, innermost last.
    scopes: Vec<HashMap<String, PatternValue>>,
    /// The flat rule table for the grammar currently being compiled.
    grammar: Option<GrammarCtx>,
    diagnostics: Vec<Diagnostic>,
    boundary: Option<Pattern>,
}

/// A resolved name, detached from the environment's lifetime.
enum Resolved {
    Pattern(PatternValue),
    Macro(MacroOp),
    PFunction(PrimOp),
    Package,
}

impl<'a> Compiler<'a> {
    fn new(env: &'a Environment) -> Self {
        Self {
            env,
            scopes: Vec::new(),
            grammar: None,
            diagnostics: Vec::new(),
            boundary: None,
        }
    }

    fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn error(&mut self, code: ErrorCode, span: Span, message: String) {
        self.diagnostics
            .push(Diagnostic::error(code, span).with_message(message));
    }

    /// The boundary matcher spliced by cooked mode. Honors a user
    /// rebinding of `~`.
    fn boundary(&mut self) -> Pattern {
        if self.boundary.is_none() {
            let pat = match self.resolve(None, "~") {
                Some(Resolved::Pattern(value)) => value.pat,
                _ => prelude::boundary(),
            };
            self.boundary = Some(pat);
        }
        self.boundary.clone().expect("cached above")
    }

    fn resolve(&self, package: Option<&str>, name: &str) -> Option<Resolved> {
        if package.is_none() {
            for scope in self.scopes.iter().rev() {
                if let Some(value) = scope.get(name) {
                    return Some(Resolved::Pattern(value.clone()));
                }
            }
        }
        let value = match package {
            Some(pkg) => self.env.lookup_qualified(pkg, name)?,
            None => self.env.lookup(name)?,
        };
        Some(match value {
            EnvValue::Pattern(v) => Resolved::Pattern(v.clone()),
            EnvValue::Macro(op) => Resolved::Macro(*op),
            EnvValue::PFunction(op) => Resolved::PFunction(*op),
            EnvValue::Package(_) => Resolved::Package,
        })
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    fn compile_binding(&mut self, binding: &Binding) -> Option<PatternValue> {
        let body = self.compile_exp(&binding.exp, Mode::Cooked)?;
        if binding.is_alias {
            return Some(PatternValue {
                pat: body,
                uncaptured: None,
                alias: true,
            });
        }
        // A grammar's entry rule already carries its capture
        if matches!(binding.exp.kind, ExpKind::Grammar { .. }) {
            return Some(PatternValue {
                pat: body,
                uncaptured: None,
                alias: false,
            });
        }
        let captured = Pattern::Capture {
            name: binding.name.clone(),
            pat: Box::new(body.clone()),
        };
        Some(PatternValue {
            pat: captured,
            uncaptured: Some(body),
            alias: false,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Lower one expression. Returns `None` after recording a diagnostic;
    /// containers keep compiling their other children first so a single
    /// pass reports as much as possible.
    fn compile_exp(&mut self, exp: &Exp, mode: Mode) -> Option<Pattern> {
        match &exp.kind {
            ExpKind::Literal(bytes) => Some(Pattern::Literal(bytes.clone())),

            ExpKind::Ref { package, name } => self.compile_ref(package.as_deref(), name, exp.span),

            ExpKind::Sequence(items) => {
                let compiled: Vec<Option<Pattern>> = items
                    .iter()
                    .map(|item| self.compile_exp(item, mode))
                    .collect();
                let mut out = Vec::new();
                for (i, item) in compiled.into_iter().enumerate() {
                    if i > 0 && mode == Mode::Cooked {
                        out.push(self.boundary());
                    }
                    out.push(item?);
                }
                Some(Pattern::seq(out))
            }

            ExpKind::Choice(arms) => {
                let compiled: Vec<Option<Pattern>> =
                    arms.iter().map(|arm| self.compile_exp(arm, mode)).collect();
                let arms: Option<Vec<Pattern>> = compiled.into_iter().collect();
                Some(Pattern::choice(arms?))
            }

            ExpKind::Predicate { kind, exp: body } => {
                let body = self.compile_exp(body, Mode::Raw)?;
                Some(match kind {
                    PredicateKind::Negation => Pattern::Negation(Box::new(body)),
                    PredicateKind::Lookahead => Pattern::Lookahead(Box::new(body)),
                })
            }

            ExpKind::Repetition {
                min,
                max,
                exp: body,
                cooked,
            } => self.compile_repetition(body, *min, *max, *cooked, exp.span),

            ExpKind::NamedSet { .. }
            | ExpKind::Range { .. }
            | ExpKind::Charlist { .. }
            | ExpKind::SetUnion { .. } => self.compile_charset(exp).map(Pattern::Set),

            ExpKind::Cooked(inner) => self.compile_exp(inner, Mode::Cooked),
            ExpKind::Raw(inner) => self.compile_exp(inner, Mode::Raw),

            ExpKind::Capture { name, exp: body } => self.compile_capture(name, body),

            ExpKind::Grammar { rules } => self.compile_grammar(rules, exp.span),

            ExpKind::Application { name, args } => {
                self.compile_application(name, args, exp.span, mode)
            }

            // The parser already reported these
            ExpKind::SyntaxError { .. } => None,
        }
    }

    fn compile_ref(&mut self, package: Option<&str>, name: &str, span: Span) -> Option<Pattern> {
        let display = match package {
            Some(pkg) => format!("{}.{}", pkg, name),
            None => name.to_string(),
        };
        match self.resolve(package, name) {
            Some(Resolved::Pattern(value)) => Some(value.pat),
            Some(Resolved::Macro(_)) | Some(Resolved::PFunction(_)) => {
                self.error(
                    ErrorCode::E100,
                    span,
                    format!("\"{}\" is a macro; apply it as {}:exp", display, display),
                );
                None
            }
            Some(Resolved::Package) => {
                self.error(
                    ErrorCode::E100,
                    span,
                    format!("\"{}\" is a package, not a pattern", display),
                );
                None
            }
            None => {
                self.error(
                    ErrorCode::E100,
                    span,
                    format!("undefined identifier \"{}\"", display),
                );
                None
            }
        }
    }

    fn compile_repetition(
        &mut self,
        body: &Exp,
        min: u32,
        max: Option<u32>,
        cooked: bool,
        span: Span,
    ) -> Option<Pattern> {
        let mode = if cooked { Mode::Cooked } else { Mode::Raw };
        let compiled = self.compile_exp(body, mode)?;

        if let Some(max) = max {
            if min > max {
                self.error(
                    ErrorCode::E103,
                    span,
                    format!("repetition range {{{},{}}} is inverted", min, max),
                );
                return None;
            }
        }
        // Loop safety: an unbounded repetition over a possibly-empty body
        // never makes progress. Grammar rules are exempt, where recursion
        // makes the syntactic check too conservative.
        if max.is_none() && self.grammar.is_none() && compiled.nullable() {
            self.error(
                ErrorCode::E102,
                span,
                "repetition body may match the empty string".into(),
            );
            return None;
        }

        if cooked {
            Some(self.cooked_repeat(compiled, min, max))
        } else {
            Some(Pattern::Repeat {
                pat: Box::new(compiled),
                min,
                max,
            })
        }
    }

    /// Token-aware repetition: the boundary goes between iterations.
    /// `(e)+` is `(e ~)+`, `(e)*` is `(e (~ e)*)?`, `(e){n,m}` is
    /// `e ~ e … ~ e`; `(e)?` needs no boundary.
    fn cooked_repeat(&mut self, body: Pattern, min: u32, max: Option<u32>) -> Pattern {
        let boundary = self.boundary();
        let rep = |pat, min, max| Pattern::Repeat {
            pat: Box::new(pat),
            min,
            max,
        };
        match (min, max) {
            (0, Some(0)) => Pattern::Literal(Vec::new()),
            (0, Some(1)) => rep(body, 0, Some(1)),
            (1, None) => rep(Pattern::Seq(vec![body, boundary]), 1, None),
            (0, max) => {
                // (e (~ e){0,m-1})?
                let tail = rep(
                    Pattern::Seq(vec![boundary, body.clone()]),
                    0,
                    max.map(|m| m - 1),
                );
                rep(Pattern::Seq(vec![body, tail]), 0, Some(1))
            }
            (min, max) => {
                // e (~ e){min-1,m-1}
                let tail = rep(
                    Pattern::Seq(vec![boundary, body.clone()]),
                    min - 1,
                    max.map(|m| m - 1),
                );
                Pattern::Seq(vec![body, tail])
            }
        }
    }

    /// Lower a charset form to a byte set.
    fn compile_charset(&mut self, exp: &Exp) -> Option<ByteSet> {
        match &exp.kind {
            ExpKind::NamedSet { name, complement } => match named_class(name) {
                Some(set) => Some(apply_complement(set, *complement)),
                None => {
                    self.error(
                        ErrorCode::E101,
                        exp.span,
                        format!("undefined character class \"{}\"", name),
                    );
                    None
                }
            },
            ExpKind::Range {
                lo,
                hi,
                complement,
            } => Some(apply_complement(ByteSet::range(*lo, *hi), *complement)),
            ExpKind::Charlist { chars, complement } => {
                Some(apply_complement(ByteSet::from_bytes(chars), *complement))
            }
            ExpKind::SetUnion { items, complement } => {
                let mut set = ByteSet::new();
                let mut failed = false;
                for item in items {
                    match self.compile_charset(item) {
                        Some(sub) => set = set.union(&sub),
                        None => failed = true,
                    }
                }
                (!failed).then(|| apply_complement(set, *complement))
            }
            _ => {
                self.error(
                    ErrorCode::E001,
                    exp.span,
                    "expected a character set".into(),
                );
                None
            }
        }
    }

    /// Named capture with the re-capture rule: capturing something that
    /// already carries a capture relabels its inner form instead of
    /// nesting two nodes over the same span.
    fn compile_capture(&mut self, name: &str, body: &Exp) -> Option<Pattern> {
        if let ExpKind::Ref { package, name: ref_name } = &body.kind {
            if let Some(Resolved::Pattern(value)) = self.resolve(package.as_deref(), ref_name) {
                let inner = value.uncaptured.unwrap_or(value.pat);
                return Some(Pattern::Capture {
                    name: name.to_string(),
                    pat: Box::new(inner),
                });
            }
        }
        let compiled = self.compile_exp(body, Mode::Raw)?;
        let inner = match compiled {
            Pattern::Capture { pat, .. } => *pat,
            other => other,
        };
        Some(Pattern::Capture {
            name: name.to_string(),
            pat: Box::new(inner),
        })
    }

    /// Compile a grammar: forward-declare every rule name, compile each
    /// right-hand side, then tie the knot and verify it.
    fn compile_grammar(&mut self, rules: &[Binding], span: Span) -> Option<Pattern> {
        let outermost = self.grammar.is_none();
        if outermost {
            self.grammar = Some(GrammarCtx {
                rules: Vec::new(),
                failed: false,
            });
        }

        let ctx = self.grammar.as_mut().expect("installed above");
        let base = ctx.rules.len();
        for rule in rules {
            // Placeholder body, patched after compilation
            ctx.rules.push(Rule::new(rule.name.clone(), Pattern::Halt));
        }

        let mut overlay = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            if overlay
                .insert(
                    rule.name.clone(),
                    PatternValue {
                        pat: Pattern::Call(base + i),
                        uncaptured: None,
                        alias: rule.is_alias,
                    },
                )
                .is_some()
            {
                self.error(
                    ErrorCode::E105,
                    rule.span,
                    format!("duplicate grammar rule \"{}\"", rule.name),
                );
            }
        }
        self.scopes.push(overlay);

        for (i, rule) in rules.iter().enumerate() {
            match self.compile_exp(&rule.exp, Mode::Cooked) {
                Some(body) => {
                    let body = if rule.is_alias {
                        body
                    } else {
                        Pattern::Capture {
                            name: rule.name.clone(),
                            pat: Box::new(body),
                        }
                    };
                    self.grammar.as_mut().expect("in grammar").rules[base + i].pattern = body;
                }
                None => self.grammar.as_mut().expect("in grammar").failed = true,
            }
        }
        self.scopes.pop();

        if !outermost {
            // Nested grammar (macro expansion inside a rule): its rules
            // joined the enclosing table; enter through its first rule.
            if self.grammar.as_ref().expect("in grammar").failed {
                return None;
            }
            return Some(Pattern::Call(base));
        }

        let ctx = self.grammar.take().expect("installed above");
        if ctx.failed {
            self.error(
                ErrorCode::E105,
                span,
                "grammar aborted because some rules failed to compile".into(),
            );
            return None;
        }
        match verify_grammar(&ctx.rules) {
            Ok(()) => Some(Pattern::Grammar { rules: ctx.rules }),
            Err(fault) => {
                self.error(ErrorCode::E105, span, fault.to_string());
                None
            }
        }
    }

    fn compile_application(
        &mut self,
        name: &str,
        args: &[Exp],
        span: Span,
        mode: Mode,
    ) -> Option<Pattern> {
        match self.resolve(None, name) {
            Some(Resolved::Macro(op)) => match op(args, span) {
                Ok(expanded) => self.compile_exp(&expanded, mode),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    None
                }
            },
            Some(Resolved::PFunction(op)) => match op(args, span) {
                Ok(pat) => Some(pat),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    None
                }
            },
            Some(_) => {
                self.error(
                    ErrorCode::E100,
                    span,
                    format!("\"{}\" is not a macro", name),
                );
                None
            }
            None => {
                self.error(
                    ErrorCode::E100,
                    span,
                    format!("undefined identifier \"{}\"", name),
                );
                None
            }
        }
    }
}

fn apply_complement(set: ByteSet, complement: bool) -> ByteSet {
    if complement {
        set.complement()
    } else {
        set
    }
}
