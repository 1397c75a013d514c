//! Diagnostics: collection, codes, source references, recovery.

use rosie::{DiagnosticRenderer, Engine, ErrorCode, Severity};

use crate::{expr_errors, load_errors};

// Scenario: compiling `/foo/` produces one Syntax diagnostic pointing at
// column 1, and the compile phase never runs.
#[test]
fn bare_slash_is_a_syntax_error_at_column_one() {
    let mut engine = Engine::new();
    let loaded = engine.load_source("/foo/");
    assert!(!loaded.ok);
    let errors: Vec<_> = loaded.diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(!errors.is_empty());
    assert_eq!(errors[0].code(), ErrorCode::E001);
    let source = engine.source(loaded.source).unwrap();
    let loc = source.locate(errors[0].span().start());
    assert_eq!((loc.line, loc.col), (1, 1));
}

#[test]
fn parser_collects_several_syntax_errors() {
    let diags = load_errors("a = )\nb = *\nc = \"ok\"");
    let count = diags.iter().filter(|d| d.is_error()).count();
    assert!(count >= 3, "expected several errors, got {}", count);
}

#[test]
fn undefined_identifier() {
    let diags = expr_errors("", "nothere");
    assert_eq!(diags[0].code(), ErrorCode::E100);
    assert!(diags[0].message().contains("nothere"));
}

#[test]
fn undefined_identifier_with_package() {
    let diags = expr_errors("", "net.any");
    assert_eq!(diags[0].code(), ErrorCode::E100);
    assert!(diags[0].message().contains("net.any"));
}

#[test]
fn undefined_charset() {
    let diags = expr_errors("", "[:hiragana:]");
    assert_eq!(diags[0].code(), ErrorCode::E101);
}

#[test]
fn quantified_empty() {
    let diags = expr_errors("", "(\"a\"?)*");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E102));

    let diags = expr_errors("", "\"\"+");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E102));
}

#[test]
fn repetition_range() {
    let diags = expr_errors("", "\"a\"{3,1}");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E103));
}

#[test]
fn compile_collects_several_errors() {
    let diags = expr_errors("", "{missing1 missing2 [:bogus:]}");
    let errors = diags.iter().filter(|d| d.is_error()).count();
    assert_eq!(errors, 3);
}

#[test]
fn invalid_escape_in_literal() {
    let diags = load_errors("x = \"a\\q\"");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E002));
}

#[test]
fn unterminated_string() {
    let diags = load_errors("x = \"abc");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E003));
}

#[test]
fn unterminated_charset() {
    let diags = load_errors("x = [0-9");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E004));
}

#[test]
fn newer_version_is_rejected() {
    let diags = load_errors("rpl 99.0\nx = \"a\"");
    assert!(diags
        .iter()
        .any(|d| d.code() == ErrorCode::E010 && d.is_error()));
}

#[test]
fn older_major_version_warns_but_loads() {
    let mut engine = Engine::new();
    let loaded = engine.load_source("rpl 0.9\nx = \"a\"");
    assert!(loaded.ok);
    assert!(loaded
        .diagnostics
        .iter()
        .any(|d| d.code() == ErrorCode::E010 && d.severity() == Severity::Warning));
}

#[test]
fn failed_binding_does_not_poison_the_rest() {
    let mut engine = Engine::new();
    let loaded = engine.load_source("bad = nothere\ngood = \"g\"");
    assert!(!loaded.ok);
    // The good binding still compiled
    assert!(engine.compile_expression("good").is_ok());
    assert!(engine.compile_expression("bad").is_err());
}

#[test]
fn diagnostics_render_with_caret() {
    let mut engine = Engine::new();
    let loaded = engine.load_source("num = [0-9]+ oops");
    assert!(!loaded.ok);
    let source = engine.source(loaded.source).unwrap();
    let renderer = DiagnosticRenderer::new(source);
    let error = loaded
        .diagnostics
        .iter()
        .find(|d| d.is_error())
        .expect("an error diagnostic");
    let text = renderer.render_to_string(error);
    assert!(text.contains("error[E100]"));
    assert!(text.contains("--> <top-level>:1:14"));
    assert!(text.contains("^"));
}
