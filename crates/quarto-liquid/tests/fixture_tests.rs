/*
 * fixture_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Includes resolved through the file template store, using test fixtures.
 */

use pretty_assertions::assert_eq;
use quarto_liquid::{Bindings, Engine, EngineOptions, StoreError, TemplateError, Value};
use std::path::{Path, PathBuf};

/// Helper to get the path to the fixture templates
fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test-fixtures")
        .join("templates")
}

fn engine() -> Engine {
    Engine::with_options(EngineOptions {
        template_root: Some(fixture_root()),
        ..EngineOptions::default()
    })
}

fn bindings(json: serde_json::Value) -> Bindings {
    match Value::from(json) {
        Value::Map(map) => map,
        other => panic!("bindings must be an object, got {:?}", other),
    }
}

#[test]
fn test_nested_includes() {
    let params = bindings(serde_json::json!({
        "page": { "title": "Intro", "body": "Body" },
    }));
    let out = engine()
        .parse_and_render_string("{% include 'page.html' %}", &params)
        .unwrap();
    assert_eq!(out, "<h1>Intro</h1><p>Body</p>");
}

#[test]
fn test_include_from_subdirectory_with_alias() {
    let params = bindings(serde_json::json!({
        "products": [{ "name": "a" }, { "name": "b" }],
    }));
    let engine = engine();
    let out = engine
        .parse_and_render_string("{% include 'list.html' %}", &params)
        .unwrap();
    assert_eq!(out, "[a][b]");
    assert!(engine.cache().contains("partials/card.liquid"));
}

#[test]
fn test_render_is_isolated_and_assignments_stay_local() {
    let params = bindings(serde_json::json!({ "greeting": "Hi" }));
    let engine = engine();
    let out = engine
        .parse_and_render_string(
            "{% render 'isolated.html', name: 'Ann' %}|{% include 'isolated.html', name: 'Bob' %}|{{ greeting }}",
            &params,
        )
        .unwrap();
    assert_eq!(out, ", Ann|Hi, Bob|Hi");
}

#[test]
fn test_self_include_hits_depth_limit() {
    let engine = Engine::with_options(EngineOptions {
        template_root: Some(fixture_root()),
        max_include_depth: 10,
        ..EngineOptions::default()
    });
    let err = engine
        .parse_and_render_string("{% include 'recursive.html' %}", &Bindings::new())
        .unwrap_err();
    assert!(matches!(
        err,
        TemplateError::RecursiveInclude { ref name, max_depth: 10 } if name == "recursive.html"
    ));
}

#[test]
fn test_missing_file() {
    let err = engine()
        .parse_and_render_string("{% include 'missing.html' %}", &Bindings::new())
        .unwrap_err();
    assert!(matches!(
        err,
        TemplateError::Store {
            source: StoreError::NotFound { .. },
            ..
        }
    ));
}

#[test]
fn test_file_store_in_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("note.txt"), "note: {{ text | upcase }}").unwrap();
    std::fs::write(dir.path().join("bad.txt"), [0x66u8, 0xff]).unwrap();

    let engine = Engine::with_options(EngineOptions {
        template_root: Some(dir.path().to_path_buf()),
        ..EngineOptions::default()
    });
    let params = bindings(serde_json::json!({ "text": "hello" }));
    assert_eq!(
        engine
            .parse_and_render_string("{% include 'note.txt' %}", &params)
            .unwrap(),
        "note: HELLO"
    );

    let err = engine
        .parse_and_render_string("{% include 'bad.txt' %}", &params)
        .unwrap_err();
    assert!(matches!(
        err,
        TemplateError::Store {
            source: StoreError::InvalidUtf8 { .. },
            ..
        }
    ));
}
