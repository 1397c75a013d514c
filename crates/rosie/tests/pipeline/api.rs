//! Engine API behavior: handles, limits, cancellation, tracing.

use std::sync::atomic::Ordering;

use rosie::{Engine, EngineConfig, EngineError, MIN_ALLOC_LIMIT};

use crate::{compile, engine_with};

// ============================================================================
// Matcher handles
// ============================================================================

#[test]
fn handles_are_engine_scoped_and_freeable() {
    let mut engine = engine_with("num = [0-9]+");
    let a = compile(&mut engine, "num");
    let b = compile(&mut engine, "find:num");
    assert_ne!(a, b);

    engine.free_matcher(a).unwrap();
    assert!(matches!(
        engine.run_matcher(a, 0, b"1"),
        Err(EngineError::NoSuchPattern(_))
    ));
    // Other handles are unaffected
    assert!(engine.run_matcher(b, 0, b"x 1").unwrap().matched());
}

#[test]
fn double_free_is_reported() {
    let mut engine = engine_with("");
    let id = compile(&mut engine, "\"x\"");
    engine.free_matcher(id).unwrap();
    assert!(engine.free_matcher(id).is_err());
}

// ============================================================================
// Allocation limits
// ============================================================================

#[test]
fn alloc_limit_accessors() {
    let mut engine = Engine::new();
    assert!(engine.alloc_limit() > 0); // bounded by default
    engine.set_alloc_limit(0).unwrap();
    assert_eq!(engine.alloc_limit(), 0);

    let err = engine.set_alloc_limit(MIN_ALLOC_LIMIT - 1).unwrap_err();
    assert!(matches!(err, EngineError::AllocLimitTooLow { .. }));
    assert_eq!(err.code(), rosie::ErrorCode::E203);
}

#[test]
fn exhausting_the_limit_soft_aborts() {
    let mut engine = Engine::with_config(EngineConfig {
        alloc_limit: MIN_ALLOC_LIMIT,
        ..EngineConfig::default()
    });
    let loaded = engine.load_source("c = {.}");
    assert!(loaded.ok);
    let id = engine.compile_expression("findall:c").unwrap();

    let input = vec![b'x'; 200_000];
    let result = engine.run_matcher(id, 0, &input).unwrap();
    assert!(result.aborted);
    assert!(engine.alloc_usage() >= MIN_ALLOC_LIMIT);
}

#[test]
fn usage_is_tracked_per_run() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "findall:num");
    engine.run_matcher(id, 0, b"1 2 3").unwrap();
    let usage = engine.alloc_usage();
    assert!(usage > 0);
    engine.run_matcher(id, 0, b"4").unwrap();
    assert!(engine.alloc_usage() < usage);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancel_flag_aborts_the_run() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "findall:num");
    engine.cancel_flag().store(true, Ordering::Relaxed);
    let result = engine.run_matcher(id, 0, b"1 2 3").unwrap();
    assert!(result.aborted);
    assert!(result.tree.is_none() || result.leftover == 5);

    // Clearing the flag restores normal operation
    engine.cancel_flag().store(false, Ordering::Relaxed);
    let result = engine.run_matcher(id, 0, b"1 2 3").unwrap();
    assert!(result.matched());
}

// ============================================================================
// Tracing
// ============================================================================

#[test]
fn trace_condensed_shows_attempts() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "\"a\" / num");
    let out = engine.trace(id, 0, "condensed", b"42").unwrap();
    assert!(out.matched);
    let text = String::from_utf8(out.trace).unwrap();
    assert!(text.contains("fail literal \"a\""));
    assert!(text.contains("ok"));
}

#[test]
fn trace_json_is_parseable() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let out = engine.trace(id, 0, "json", b"7").unwrap();
    let events: serde_json::Value = serde_json::from_slice(&out.trace).unwrap();
    let events = events.as_array().unwrap();
    assert!(!events.is_empty());
    assert!(events[0]["label"].is_string());
    assert_eq!(events[0]["pos"], 0);
}

#[test]
fn trace_reports_failure() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let out = engine.trace(id, 0, "condensed", b"abc").unwrap();
    assert!(!out.matched);
}

#[test]
fn unknown_trace_style() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    assert!(matches!(
        engine.trace(id, 0, "interpretive-dance", b"1"),
        Err(EngineError::NoSuchTraceStyle(_))
    ));
}

// ============================================================================
// Engine state
// ============================================================================

#[test]
fn binding_names_lists_visible_patterns() {
    let engine = engine_with("num = [0-9]+\nalias ws = [:space:]+");
    let names = engine.binding_names();
    assert!(names.iter().any(|n| n == "num"));
    assert!(names.iter().any(|n| n == "ws"));
    // Prelude names are visible too
    assert!(names.iter().any(|n| n == "find"));
    assert!(names.iter().any(|n| n == "~"));
}

#[test]
fn shadowing_the_prelude_is_allowed() {
    // The prelude itself is read-only, but an engine scope may shadow it
    let mut engine = engine_with("alias h = halt");
    let loaded = engine.load_source("halt = \"HALT\"");
    assert!(loaded.ok);
    let id = engine.compile_expression("halt").unwrap();
    let result = engine.run_matcher(id, 0, b"HALT").unwrap();
    assert!(result.matched());
    assert!(!result.aborted);
}

#[test]
fn lib_path_accessors() {
    let mut engine = Engine::new();
    assert!(engine.lib_path().is_empty());
    engine.set_lib_path(vec!["/tmp/rpl".into()]);
    assert_eq!(engine.lib_path().len(), 1);
}

#[test]
fn separate_engines_are_independent() {
    let mut a = engine_with("x = \"a\"");
    let b = engine_with("y = \"b\"");
    assert!(a.compile_expression("y").is_err());
    drop(b);
    let id = a.compile_expression("x").unwrap();
    assert!(a.run_matcher(id, 0, b"a").unwrap().matched());
}
