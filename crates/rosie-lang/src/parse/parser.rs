//! Recursive-descent parser with statement-level error recovery.
//!
//! The parser never fails hard: a malformed statement becomes a
//! `SyntaxError` placeholder binding, the problem is recorded as a
//! diagnostic, and scanning resumes at the next plausible statement head.

use rosie_core::{Diagnostic, ErrorCode, SourceFile, Span};

use super::preparse;
use super::scanner::{Scanner, Token, TokenKind};
use crate::ast::{Binding, Exp, ExpKind, Import, PredicateKind, Program};

/// Names that cannot be used as pattern identifiers.
const KEYWORDS: &[&str] = &["alias", "grammar", "end", "in", "import", "package", "as", "rpl"];

/// Result of parsing a unit of source.
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
    /// Bytes of input the parser did not consume. Zero when recovery
    /// reached the end of the source.
    pub leftover: usize,
}

/// Parse a full RPL unit: version declaration, package declaration,
/// imports, bindings, and an optional trailing expression.
pub fn parse_program(source: &SourceFile) -> ParseOutput {
    let (version, offset, mut diagnostics) = preparse(source.text());
    let (tokens, scan_diags) = Scanner::new(&source.text()[offset..], offset).scan();
    diagnostics.extend(scan_diags);

    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics,
    };
    let mut program = Program {
        version,
        ..Program::default()
    };
    parser.parse_statements(&mut program);

    let consumed = parser.cur().span.start() as usize;
    ParseOutput {
        program,
        diagnostics: parser.diagnostics,
        leftover: source.text().len().saturating_sub(consumed),
    }
}

/// Parse a single expression (compile-expression mode).
pub fn parse_expression(source: &SourceFile) -> (Exp, Vec<Diagnostic>) {
    let (tokens, diagnostics) = Scanner::new(source.text(), 0).scan();
    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics,
    };
    let exp = parser.parse_choice();
    if !matches!(parser.cur().kind, TokenKind::Eof) {
        let span = parser.cur().span;
        parser.diagnostics.push(
            Diagnostic::error(ErrorCode::E001, span)
                .with_message("unexpected input after expression"),
        );
    }
    (exp, parser.diagnostics)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur().kind, TokenKind::Eof)
    }

    fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(ErrorCode::E001, span).with_message(message));
    }

    fn syntax_error_exp(&self, message: impl Into<String>, span: Span) -> Exp {
        Exp::new(
            ExpKind::SyntaxError {
                message: message.into(),
            },
            span,
        )
    }

    /// Is the current token an unqualified identifier with this exact name?
    fn at_keyword(&self, name: &str) -> bool {
        matches!(&self.cur().kind, TokenKind::Ident { package: None, name: n } if n == name)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statements(&mut self, program: &mut Program) {
        while !self.at_eof() {
            if self.at_keyword("package") {
                self.parse_package(program);
            } else if self.at_keyword("import") {
                self.parse_import(program);
            } else if self.at_keyword("alias") {
                self.advance();
                self.parse_binding(program, true);
            } else if self.at_keyword("grammar") {
                if let Some(binding) = self.parse_grammar_statement() {
                    program.bindings.push(binding);
                }
            } else if self.at_binding_head() {
                self.parse_binding(program, false);
            } else if self.starts_exp() {
                let exp = self.parse_choice();
                if program.expression.is_some() {
                    self.error_at(exp.span, "only one trailing expression is allowed");
                } else {
                    program.expression = Some(exp);
                }
            } else {
                let span = self.cur().span;
                self.error_at(span, "expected a statement");
                program.bindings.push(Binding {
                    name: "<syntax error>".into(),
                    exp: self.syntax_error_exp("unparseable statement", span),
                    is_alias: true,
                    span,
                });
                self.recover_statement();
            }
        }
    }

    /// Current token begins a `name = …` binding.
    fn at_binding_head(&self) -> bool {
        matches!(&self.cur().kind, TokenKind::Ident { package: None, name }
            if !KEYWORDS.contains(&name.as_str()))
            && matches!(self.next().kind, TokenKind::Equals)
    }

    fn parse_package(&mut self, program: &mut Program) {
        let kw = self.advance();
        match self.cur().kind.clone() {
            TokenKind::Ident {
                package: None,
                name,
            } if !KEYWORDS.contains(&name.as_str()) => {
                self.advance();
                if program.package.is_some() {
                    self.error_at(kw.span, "duplicate package declaration");
                } else {
                    program.package = Some(name);
                }
            }
            _ => {
                self.error_at(kw.span, "expected a package name");
                self.recover_statement();
            }
        }
    }

    fn parse_import(&mut self, program: &mut Program) {
        let kw = self.advance();
        let path = match self.cur().kind.clone() {
            TokenKind::Ident {
                package: None,
                name,
            } if !KEYWORDS.contains(&name.as_str()) => {
                self.advance();
                name
            }
            // Slashed importpaths are written as strings: import "net/ip"
            TokenKind::Literal(bytes) => {
                self.advance();
                String::from_utf8_lossy(&bytes).into_owned()
            }
            _ => {
                self.error_at(kw.span, "expected an importpath");
                self.recover_statement();
                return;
            }
        };
        let mut alias = None;
        if self.at_keyword("as") {
            self.advance();
            match self.cur().kind.clone() {
                TokenKind::Ident {
                    package: None,
                    name,
                } if !KEYWORDS.contains(&name.as_str()) => {
                    self.advance();
                    alias = Some(name);
                }
                _ => {
                    let span = self.cur().span;
                    self.error_at(span, "expected a name after `as`");
                }
            }
        }
        let span = kw.span.cover(self.cur().span);
        program.imports.push(Import { path, alias, span });
    }

    fn parse_binding(&mut self, program: &mut Program, is_alias: bool) {
        let name_token = self.advance();
        let name = match name_token.kind {
            TokenKind::Ident {
                package: None,
                name,
            } => name,
            _ => {
                self.error_at(name_token.span, "expected a binding name");
                self.recover_statement();
                return;
            }
        };
        if !matches!(self.cur().kind, TokenKind::Equals) {
            let span = self.cur().span;
            self.error_at(span, format!("expected `=` after \"{}\"", name));
            self.recover_statement();
            return;
        }
        self.advance();
        let exp = self.parse_choice();
        let span = name_token.span.cover(exp.span);
        program.bindings.push(Binding {
            name,
            exp,
            is_alias,
            span,
        });
    }

    /// `grammar <rules> end` or `grammar <rules> in <rules> end`.
    ///
    /// Rules before `in` are private to the grammar; the entry production
    /// is the first rule after `in` (or the first rule overall), and its
    /// name becomes the binding name.
    fn parse_grammar_statement(&mut self) -> Option<Binding> {
        let kw = self.advance();
        let mut pre = self.parse_grammar_rules();
        let rules = if self.at_keyword("in") {
            self.advance();
            let mut post = self.parse_grammar_rules();
            post.append(&mut pre);
            post
        } else {
            pre
        };

        if self.at_keyword("end") {
            self.advance();
        } else {
            let span = self.cur().span;
            self.error_at(span, "expected `end` to close the grammar");
        }

        if rules.is_empty() {
            self.error_at(kw.span, "grammar has no rules");
            return Some(Binding {
                name: "<syntax error>".into(),
                exp: self.syntax_error_exp("empty grammar", kw.span),
                is_alias: true,
                span: kw.span,
            });
        }

        let span = kw.span.cover(rules.last().map(|r| r.span).unwrap_or(kw.span));
        let (name, is_alias) = (rules[0].name.clone(), rules[0].is_alias);
        Some(Binding {
            name,
            is_alias,
            exp: Exp::new(ExpKind::Grammar { rules }, span),
            span,
        })
    }

    fn parse_grammar_rules(&mut self) -> Vec<Binding> {
        let mut rules = Vec::new();
        loop {
            let is_alias = if self.at_keyword("alias") {
                self.advance();
                true
            } else {
                false
            };
            if !is_alias && !self.at_binding_head() {
                break;
            }
            let mut scratch = Program::default();
            self.parse_binding(&mut scratch, is_alias);
            match scratch.bindings.pop() {
                Some(binding) => rules.push(binding),
                None => break, // parse_binding already recovered
            }
        }
        rules
    }

    /// Skip forward to the next plausible statement head.
    fn recover_statement(&mut self) {
        while !self.at_eof() {
            if self.at_binding_head()
                || self.at_keyword("alias")
                || self.at_keyword("grammar")
                || self.at_keyword("import")
                || self.at_keyword("package")
            {
                return;
            }
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Can the current token begin an expression? Bindings shadow
    /// sequences: `a = b c = d` breaks before `c`.
    fn starts_exp(&self) -> bool {
        match &self.cur().kind {
            TokenKind::Literal(_)
            | TokenKind::Charset(_)
            | TokenKind::LParen
            | TokenKind::LBrace
            | TokenKind::Bang
            | TokenKind::Amp => true,
            TokenKind::Ident { package, name } => {
                if package.is_none() && KEYWORDS.contains(&name.as_str()) {
                    return false;
                }
                !self.at_binding_head()
            }
            _ => false,
        }
    }

    fn parse_choice(&mut self) -> Exp {
        let mut arms = vec![self.parse_seq()];
        while matches!(self.cur().kind, TokenKind::Slash) {
            self.advance();
            arms.push(self.parse_seq());
        }
        if arms.len() == 1 {
            arms.pop().unwrap()
        } else {
            let span = arms[0].span.cover(arms.last().unwrap().span);
            Exp::new(ExpKind::Choice(arms), span)
        }
    }

    fn parse_seq(&mut self) -> Exp {
        let mut items = Vec::new();
        while self.starts_exp() {
            items.push(self.parse_prefixed());
        }
        match items.len() {
            0 => {
                let span = self.cur().span;
                self.error_at(span, "expected an expression");
                self.syntax_error_exp("missing expression", span)
            }
            1 => items.pop().unwrap(),
            _ => {
                let span = items[0].span.cover(items.last().unwrap().span);
                Exp::new(ExpKind::Sequence(items), span)
            }
        }
    }

    fn parse_prefixed(&mut self) -> Exp {
        let kind = match self.cur().kind {
            TokenKind::Bang => Some(PredicateKind::Negation),
            TokenKind::Amp => Some(PredicateKind::Lookahead),
            _ => None,
        };
        if let Some(kind) = kind {
            let op = self.advance();
            let exp = self.parse_prefixed();
            let span = op.span.cover(exp.span);
            return Exp::new(
                ExpKind::Predicate {
                    kind,
                    exp: Box::new(exp),
                },
                span,
            );
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Exp {
        let mut exp = self.parse_primary();
        loop {
            let (min, max) = match self.cur().kind {
                TokenKind::Star => (0, None),
                TokenKind::Plus => (1, None),
                TokenKind::Question => (0, Some(1)),
                TokenKind::Quant { min, max } => (min, max),
                _ => break,
            };
            let quant = self.advance();
            let span = exp.span.cover(quant.span);
            let cooked = matches!(exp.kind, ExpKind::Cooked(_));
            exp = Exp::new(
                ExpKind::Repetition {
                    min,
                    max,
                    exp: Box::new(exp),
                    cooked,
                },
                span,
            );
        }
        exp
    }

    fn parse_primary(&mut self) -> Exp {
        match self.cur().kind.clone() {
            TokenKind::Literal(bytes) => {
                let token = self.advance();
                Exp::new(ExpKind::Literal(bytes), token.span)
            }
            TokenKind::Charset(raw) => {
                let token = self.advance();
                let kind = self.parse_charset(&raw, token.span);
                Exp::new(kind, token.span)
            }
            TokenKind::LParen => self.parse_group(TokenKind::RParen),
            TokenKind::LBrace => self.parse_group(TokenKind::RBrace),
            TokenKind::Ident { package, name } => {
                let token = self.advance();
                if package.is_none() {
                    // find(x) — application, only when the paren is glued
                    if matches!(self.cur().kind, TokenKind::LParen) && self.cur().glued {
                        return self.parse_application_args(name, token.span);
                    }
                    // find:x — single-argument application
                    if matches!(self.cur().kind, TokenKind::Colon) {
                        self.advance();
                        let arg = self.parse_prefixed();
                        let span = token.span.cover(arg.span);
                        return Exp::new(
                            ExpKind::Application {
                                name,
                                args: vec![arg],
                            },
                            span,
                        );
                    }
                }
                Exp::new(ExpKind::Ref { package, name }, token.span)
            }
            _ => {
                let span = self.cur().span;
                self.error_at(span, "expected an expression");
                self.advance();
                self.syntax_error_exp("missing expression", span)
            }
        }
    }

    fn parse_group(&mut self, close: TokenKind) -> Exp {
        let open = self.advance();
        let exp = self.parse_choice();
        let end_span = if self.cur().kind == close {
            self.advance().span
        } else {
            let span = self.cur().span;
            let what = if close == TokenKind::RParen { ")" } else { "}" };
            self.error_at(span, format!("expected `{}`", what));
            exp.span
        };
        let span = open.span.cover(end_span);
        if close == TokenKind::RParen {
            Exp::new(ExpKind::Cooked(Box::new(exp)), span)
        } else {
            Exp::new(ExpKind::Raw(Box::new(exp)), span)
        }
    }

    fn parse_application_args(&mut self, name: String, name_span: Span) -> Exp {
        self.advance(); // '('
        let mut args = Vec::new();
        if !matches!(self.cur().kind, TokenKind::RParen) {
            loop {
                args.push(self.parse_choice());
                if matches!(self.cur().kind, TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let end_span = if matches!(self.cur().kind, TokenKind::RParen) {
            self.advance().span
        } else {
            let span = self.cur().span;
            self.error_at(span, "expected `)` to close the argument list");
            span
        };
        Exp::new(
            ExpKind::Application { name, args },
            name_span.cover(end_span),
        )
    }

    // ------------------------------------------------------------------
    // Bracket expressions
    // ------------------------------------------------------------------

    /// Parse the raw inner text of a bracket expression.
    fn parse_charset(&mut self, raw: &str, span: Span) -> ExpKind {
        // Named class: [:alpha:] or [:^alpha:]
        if let Some(body) = raw.strip_prefix(':') {
            let (complement, body) = match body.strip_prefix('^') {
                Some(rest) => (true, rest),
                None => (false, body),
            };
            match body.strip_suffix(':') {
                Some(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic()) => {
                    return ExpKind::NamedSet {
                        name: name.to_string(),
                        complement,
                    };
                }
                _ => {
                    self.error_at(span, format!("malformed named class \"[{}]\"", raw));
                    return ExpKind::SyntaxError {
                        message: "malformed named class".into(),
                    };
                }
            }
        }

        let (complement, body) = match raw.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        // Union of nested bracket expressions: [[:alpha:] [0-9]]
        if body.trim_start().starts_with('[') {
            return self.parse_charset_union(body, span, complement);
        }

        self.parse_simple_charset(body, span, complement)
    }

    fn parse_charset_union(&mut self, body: &str, span: Span, complement: bool) -> ExpKind {
        let bytes = body.as_bytes();
        let mut items = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            match bytes[pos] {
                b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
                b'[' => {
                    let start = pos + 1;
                    let mut depth = 1usize;
                    let mut end = start;
                    while end < bytes.len() && depth > 0 {
                        match bytes[end] {
                            b'\\' => end += 1,
                            b'[' => depth += 1,
                            b']' => depth -= 1,
                            _ => {}
                        }
                        end += 1;
                    }
                    if depth > 0 {
                        self.error_at(span, "unterminated nested character set");
                        break;
                    }
                    let inner = &body[start..end - 1];
                    let kind = self.parse_charset(inner, span);
                    items.push(Exp::new(kind, span));
                    pos = end;
                }
                _ => {
                    self.error_at(span, "expected a nested `[…]` inside a character set union");
                    break;
                }
            }
        }
        ExpKind::SetUnion { items, complement }
    }

    fn parse_simple_charset(&mut self, body: &str, span: Span, complement: bool) -> ExpKind {
        let bytes = body.as_bytes();
        let mut singles: Vec<u8> = Vec::new();
        let mut ranges: Vec<(u8, u8)> = Vec::new();
        let mut pos = 0usize;

        let mut next_byte = |pos: &mut usize| -> Option<u8> {
            let b = *bytes.get(*pos)?;
            *pos += 1;
            if b != b'\\' {
                return Some(b);
            }
            let esc = *bytes.get(*pos)?;
            *pos += 1;
            Some(match esc {
                b'n' => b'\n',
                b't' => b'\t',
                b'r' => b'\r',
                b'x' => {
                    let hi = (*bytes.get(*pos)? as char).to_digit(16)?;
                    let lo = (*bytes.get(*pos + 1)? as char).to_digit(16)?;
                    *pos += 2;
                    (hi * 16 + lo) as u8
                }
                other => other, // \- \] \[ \^ \\ and friends are literal
            })
        };

        while pos < bytes.len() {
            let Some(c) = next_byte(&mut pos) else {
                self.error_at(span, "truncated escape in character set");
                break;
            };
            // a-z range: dash with something on both sides
            if bytes.get(pos) == Some(&b'-') && pos + 1 < bytes.len() {
                pos += 1;
                let Some(hi) = next_byte(&mut pos) else {
                    self.error_at(span, "truncated escape in character set");
                    break;
                };
                if c > hi {
                    self.error_at(span, format!("empty range {}-{}", c as char, hi as char));
                } else {
                    ranges.push((c, hi));
                }
            } else {
                singles.push(c);
            }
        }

        match (ranges.len(), singles.len()) {
            (1, 0) => {
                let (lo, hi) = ranges[0];
                ExpKind::Range { lo, hi, complement }
            }
            (0, _) => ExpKind::Charlist {
                chars: singles,
                complement,
            },
            _ => {
                let mut items: Vec<Exp> = ranges
                    .into_iter()
                    .map(|(lo, hi)| {
                        Exp::new(
                            ExpKind::Range {
                                lo,
                                hi,
                                complement: false,
                            },
                            span,
                        )
                    })
                    .collect();
                if !singles.is_empty() {
                    items.push(Exp::new(
                        ExpKind::Charlist {
                            chars: singles,
                            complement: false,
                        },
                        span,
                    ));
                }
                ExpKind::SetUnion { items, complement }
            }
        }
    }
}
