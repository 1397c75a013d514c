//! Packages: imports, aliases, the cache, and export visibility.
//!
//! Importpaths here are unique per test: the package cache is
//! process-wide, so reusing a path across tests would alias their
//! environments.

use rosie::{Engine, ErrorCode, MemLoader};

use crate::compile;

const NET_SRC: &str = "package net\n\
                       alias octet = {[0-9]{1,3}}\n\
                       any = {octet \".\" octet \".\" octet \".\" octet}";

fn engine_with_loader(loader: MemLoader) -> Engine {
    let mut engine = Engine::new();
    engine.set_loader(Box::new(loader));
    engine
}

// Scenario: import net, compile net.any, match a dotted quad end to end.
#[test]
fn import_and_match_qualified_pattern() {
    let mut engine = engine_with_loader(MemLoader::new().add("pipetest/net", NET_SRC));
    let imported = engine.import_package("pipetest/net", None).unwrap();
    assert!(imported.ok);
    assert_eq!(imported.pkgname, "net");

    let id = compile(&mut engine, "net.any");
    let input = b"192.9.201.1";
    let result = engine.run_matcher(id, 0, input).unwrap();
    assert!(result.matched());
    let tree = result.tree.unwrap();
    assert_eq!(tree.name, "any");
    assert_eq!((tree.start, tree.end), (0, input.len()));
    assert_eq!(result.leftover, 0);
}

#[test]
fn import_with_alias() {
    let mut engine = engine_with_loader(MemLoader::new().add("pipetest/net-alias", NET_SRC));
    let imported = engine
        .import_package("pipetest/net-alias", Some("n"))
        .unwrap();
    assert!(imported.ok);

    let id = compile(&mut engine, "n.any");
    assert!(engine.run_matcher(id, 0, b"10.0.0.1").unwrap().matched());
    // The unaliased name is not bound
    assert!(engine.compile_expression("net.any").is_err());
}

#[test]
fn import_statement_in_loaded_source() {
    let mut engine = engine_with_loader(MemLoader::new().add("pipetest/net-stmt", NET_SRC));
    let loaded =
        engine.load_source("import \"pipetest/net-stmt\" as net\nip = net.any");
    assert!(loaded.ok, "{:?}", loaded.diagnostics);

    let id = compile(&mut engine, "ip");
    let result = engine.run_matcher(id, 0, b"8.8.8.8").unwrap();
    let tree = result.tree.unwrap();
    assert_eq!(tree.name, "ip");
    assert_eq!(tree.subs[0].name, "any");
}

#[test]
fn reimport_hits_the_cache() {
    let loader = MemLoader::new().add("pipetest/net-cache", NET_SRC);

    let mut first = engine_with_loader(loader);
    assert!(first.import_package("pipetest/net-cache", None).unwrap().ok);

    // Second engine has NO loader entry for the path: only the cache can
    // serve it.
    let mut second = engine_with_loader(MemLoader::new());
    let imported = second.import_package("pipetest/net-cache", None).unwrap();
    assert!(imported.ok);
    assert_eq!(imported.pkgname, "net");
    let id = compile(&mut second, "net.any");
    assert!(second.run_matcher(id, 0, b"1.2.3.4").unwrap().matched());
}

#[test]
fn only_exported_names_are_visible() {
    let mut engine = engine_with_loader(MemLoader::new().add("pipetest/net-vis", NET_SRC));
    assert!(engine.import_package("pipetest/net-vis", None).unwrap().ok);

    // `any` is exported; referencing works
    assert!(engine.compile_expression("net.any").is_ok());
    // A package is not a pattern
    let diags = engine.compile_expression("net").unwrap_err();
    assert_eq!(diags[0].code(), ErrorCode::E100);
}

#[test]
fn transitive_imports() {
    let loader = MemLoader::new()
        .add(
            "pipetest/digits",
            "package digits\nd = {[0-9]+}",
        )
        .add(
            "pipetest/csv",
            "package csv\nimport \"pipetest/digits\"\nrow = {digits.d {\",\" digits.d}*}",
        );
    let mut engine = engine_with_loader(loader);
    let imported = engine.import_package("pipetest/csv", None).unwrap();
    assert!(imported.ok, "{:?}", imported.diagnostics);

    let id = compile(&mut engine, "csv.row");
    let result = engine.run_matcher(id, 0, b"1,22,333").unwrap();
    assert!(result.matched());
    assert_eq!(result.leftover, 0);
    let tree = result.tree.unwrap();
    assert_eq!(tree.name, "row");
    assert_eq!(tree.subs.len(), 3);
}

#[test]
fn missing_package_is_a_loader_error() {
    let mut engine = engine_with_loader(MemLoader::new());
    let err = engine.import_package("pipetest/nowhere", None);
    assert!(err.is_err());
    let err = err.unwrap_err();
    assert_eq!(err.code(), ErrorCode::E200);
}

#[test]
fn broken_package_reports_diagnostics() {
    let loader =
        MemLoader::new().add("pipetest/broken", "package broken\nx = undefined_thing");
    let mut engine = engine_with_loader(loader);
    let imported = engine.import_package("pipetest/broken", None).unwrap();
    assert!(!imported.ok);
    assert!(imported
        .diagnostics
        .iter()
        .any(|d| d.code() == ErrorCode::E100));
}
