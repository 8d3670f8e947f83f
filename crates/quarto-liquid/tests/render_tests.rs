/*
 * render_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rendering tests for the standard tags, expressions and filters.
 */

use pretty_assertions::assert_eq;
use quarto_liquid::{
    Bindings, Engine, EngineOptions, MemoryTemplateStore, TemplateError, Value,
};
use std::sync::atomic::AtomicBool;

fn bindings() -> Bindings {
    match Value::from(serde_json::json!({
        "name": "World",
        "x": 123,
        "ar": ["first", "second", "third"],
        "page": { "title": "Introduction" },
        "products": [
            { "title": "Hat", "price": 12 },
            { "title": "Scarf", "price": 8 },
            { "title": "Gloves" },
        ],
    })) {
        Value::Map(map) => map,
        _ => unreachable!(),
    }
}

fn render(source: &str) -> String {
    Engine::new()
        .parse_and_render_string(source, &bindings())
        .unwrap_or_else(|e| panic!("{}: {}", source, e))
}

fn render_err(source: &str) -> TemplateError {
    Engine::new()
        .parse_and_render_string(source, &bindings())
        .unwrap_err()
}

#[test]
fn test_output_and_paths() {
    assert_eq!(render("Hello, {{ name }}!"), "Hello, World!");
    assert_eq!(render("{{ ar[0] }} {{ ar[-1] }}"), "first third");
    assert_eq!(render("{{ ar.size }} {{ ar.first }} {{ ar.last }}"), "3 first third");
    assert_eq!(render("{{ page['title'] }}"), "Introduction");
    assert_eq!(render("[{{ missing }}][{{ page.missing.deeper }}]"), "[][]");
}

#[test]
fn test_operators() {
    assert_eq!(render("{{ 1 + 2 * 3 }}"), "7");
    assert_eq!(render("{{ 7 / 2 }} {{ 7.0 / 2 }}"), "3 3.5");
    assert_eq!(render("{% if x > 100 and x < 200 %}yes{% endif %}"), "yes");
    assert_eq!(render("{% if x == 1 or x == 123 %}yes{% endif %}"), "yes");
    assert_eq!(render("{% if page.title contains 'Intro' %}yes{% endif %}"), "yes");
    assert_eq!(render("{% if ar contains 'second' %}yes{% endif %}"), "yes");
    assert_eq!(render("{% if ar == empty %}e{% else %}n{% endif %}"), "n");
    assert_eq!(render("{% if missing == empty %}e{% else %}n{% endif %}"), "e");
}

#[test]
fn test_conditionals() {
    assert_eq!(render("{% if x %}a{% elsif name %}b{% else %}c{% endif %}"), "a");
    assert_eq!(render("{% if missing %}a{% elsif name %}b{% else %}c{% endif %}"), "b");
    assert_eq!(render("{% if missing %}a{% else %}c{% endif %}"), "c");
    assert_eq!(render("{% unless missing %}shown{% endunless %}"), "shown");
    assert_eq!(render("{% unless x %}hidden{% endunless %}"), "");
    // zero and the empty string are truthy
    assert_eq!(render("{% if 0 %}t{% endif %}{% if '' %}t{% endif %}"), "tt");
}

#[test]
fn test_case() {
    let source = "{% case x %}{% when 1, 2 %}low{% when 123 %}hit{% else %}other{% endcase %}";
    assert_eq!(render(source), "hit");
    let source = "{% case name %}{% when 'a' or 'b' %}ab{% else %}other{% endcase %}";
    assert_eq!(render(source), "other");
}

#[test]
fn test_for_loops() {
    assert_eq!(
        render("{% for x in ar %}{{ forloop.index }}:{{ x }}{% unless forloop.last %},{% endunless %}{% endfor %}"),
        "1:first,2:second,3:third"
    );
    assert_eq!(render("{% for i in (1..3) %}{{ i }}{% endfor %}"), "123");
    assert_eq!(render("{% for i in (1..3) reversed %}{{ i }}{% endfor %}"), "321");
    assert_eq!(
        render("{% for i in (1..10) limit:3 offset:2 %}{{ i }}{% endfor %}"),
        "345"
    );
    assert_eq!(render("{% for x in nothing %}x{% else %}none{% endfor %}"), "none");
    assert_eq!(
        render("{% for p in products %}{{ p.title }}{% endfor %}"),
        "HatScarfGloves"
    );
    assert_eq!(
        render("{% for pair in page %}{{ pair[0] }}={{ pair[1] }}{% endfor %}"),
        "title=Introduction"
    );
}

#[test]
fn test_break_and_continue() {
    let source = "{% for i in (1..5) %}{% if i == 3 %}{% continue %}{% endif %}\
                  {% if i == 5 %}{% break %}{% endif %}{{ i }}{% endfor %}";
    assert_eq!(render(source), "124");
    // outside a loop, break just ends the template
    assert_eq!(render("a{% break %}b"), "a");
}

#[test]
fn test_loop_variable_does_not_leak() {
    assert_eq!(render("{% for x in ar %}{% endfor %}[{{ x }}]"), "[123]");
    assert_eq!(
        render("{% for x in ar %}{% assign last = x %}{% endfor %}{{ last }}"),
        "third"
    );
}

#[test]
fn test_cycle() {
    assert_eq!(
        render("{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}"),
        "abca"
    );
    assert_eq!(
        render("{% cycle 'g': 1, 2 %}{% cycle 'g': 1, 2 %}{% cycle 'g': 1, 2 %}"),
        "121"
    );
}

#[test]
fn test_cycle_advances_across_includes() {
    let mut engine = Engine::new();
    engine.register_template_store(MemoryTemplateStore::with_templates([(
        "stripe.html",
        "{% cycle 'a', 'b' %}",
    )]));
    let out = engine
        .parse_and_render_string(
            "{% for i in (1..4) %}{% include 'stripe.html' %}{% endfor %}",
            &Bindings::new(),
        )
        .unwrap();
    assert_eq!(out, "abab");
}

#[test]
fn test_non_ascii_source() {
    assert_eq!(render("a{% # café au lait %}b"), "ab");
    assert_eq!(render("{{ 'señor' | upcase }} ünïcödé {{ 'x' }}"), "SEÑOR ünïcödé x");
    // identifiers are ASCII; anything else is a syntax error, not a panic
    let err = render_err("{{ título }}");
    assert!(matches!(err, TemplateError::Syntax { .. }), "{}", err);
}

#[test]
fn test_quotes_inside_tags_and_comments() {
    assert_eq!(render("{% # don't touch %}x{{ 'y' }}"), "xy");
    assert_eq!(render("{{ \"it's\" }} {{ 'say \"hi\"' }}"), "it's say \"hi\"");
    assert_eq!(render("{{ '%}' }}{% if '}}' %}t{% endif %}"), "%}t");

    // an unbalanced quote is reported at its own tag
    let err = render_err("{% assign a = 'x %}{{ 'y' }}");
    assert!(matches!(err, TemplateError::Syntax { .. }), "{}", err);
    let location = err.location().unwrap();
    assert_eq!(location.line, 1);
    assert!(location.column <= "{% assign a = 'x %}".len(), "{}", err);
}

#[test]
fn test_oversized_ranges() {
    let mut params = bindings();
    params.insert("n".to_string(), Value::Int(i64::MAX));
    let engine = Engine::new();

    let out = engine
        .parse_and_render_string(
            "{% for i in (1..n) limit: 3 %}{{ i }}{% endfor %}",
            &params,
        )
        .unwrap();
    assert_eq!(out, "123");

    let out = engine
        .parse_and_render_string(
            "{% for i in (1..n) offset: 2 limit: 2 reversed %}{{ i }},{% endfor %}",
            &params,
        )
        .unwrap();
    assert_eq!(out, "4,3,");

    let err = engine
        .parse_and_render_string("{% assign r = (1..n) %}{{ r.size }}", &params)
        .unwrap_err();
    assert!(matches!(err, TemplateError::Evaluation { .. }), "{}", err);
}

#[test]
fn test_assign_and_capture() {
    assert_eq!(render("{% assign n = x | plus: 1 %}{{ n }}"), "124");
    assert_eq!(
        render("{% capture greeting %}Hello {{ name }}{% endcapture %}{{ greeting | upcase }}"),
        "HELLO WORLD"
    );
}

#[test]
fn test_raw_and_comments() {
    assert_eq!(render("{% raw %}{{ not rendered }}{% endraw %}"), "{{ not rendered }}");
    assert_eq!(render("a{% comment %}hidden {{ x }}{% endcomment %}b"), "ab");
    assert_eq!(render("a{% # a note %}b"), "ab");
}

#[test]
fn test_whitespace_control() {
    assert_eq!(render("a  {{- 'b' -}}  c"), "abc");
    assert_eq!(render("<ul>\n  {%- for x in ar %}\n  <li>{{ x }}</li>\n  {%- endfor %}\n</ul>"),
        "<ul>\n  <li>first</li>\n  <li>second</li>\n  <li>third</li>\n</ul>");
}

#[test]
fn test_filter_pipelines() {
    assert_eq!(render("{{ 'a,b,c' | split: ',' | reverse | join: '-' }}"), "c-b-a");
    assert_eq!(render("{{ missing | default: 'd' }}"), "d");
    assert_eq!(render("{{ false | default: 'd', allow_false: true }}"), "false");
    assert_eq!(render("{{ 10 | divided_by: 4 }} {{ 10 | divided_by: 4.0 }}"), "2 2.5");
    assert_eq!(render("{{ -7 | modulo: 3 }}"), "2");
    assert_eq!(render("{{ '2017-07-09T15:04:05Z' | date: '%Y' }}"), "2017");
    assert_eq!(render("{{ products | map: 'title' | join: ', ' }}"), "Hat, Scarf, Gloves");
    assert_eq!(
        render("{{ products | sort: 'price' | map: 'title' | join }}"),
        "Gloves, Scarf, Hat"
    );
    assert_eq!(render("{{ ar | push: 'fourth' | size }}"), "4");
    assert_eq!(render("{{ '<b>x</b>' | escape }}"), "&lt;b&gt;x&lt;/b&gt;");
}

#[test]
fn test_filter_errors() {
    let err = render_err("{{ 1 | divided_by: 0 }}");
    assert!(matches!(err, TemplateError::Filter { .. }), "{}", err);

    let err = render_err("{{ 'abc' | plus: 1 }}");
    assert!(matches!(err, TemplateError::Conversion { .. }), "{}", err);

    let err = render_err("{{ 'x' | upcase: 1, 2 }}");
    assert!(matches!(err, TemplateError::Filter { .. }), "{}", err);
}

#[test]
fn test_strict_variables() {
    let engine = Engine::with_options(EngineOptions {
        strict_variables: true,
        ..EngineOptions::default()
    });
    let err = engine
        .parse_and_render_string("{{ missing }}", &Bindings::new())
        .unwrap_err();
    assert!(matches!(err, TemplateError::UndefinedVariable { ref name, .. } if name == "missing"));

    let out = engine
        .parse_and_render_string("{% assign y = 1 %}{{ y }}", &Bindings::new())
        .unwrap();
    assert_eq!(out, "1");
}

#[test]
fn test_include_scoping() {
    let mut engine = Engine::new();
    engine.register_template_store(MemoryTemplateStore::with_templates([
        ("show.html", "[{{ secret }}{{ extra }}]"),
        ("product.html", "<{{ product.title }}>"),
    ]));
    let params = bindings();
    let render = |source: &str| engine.parse_and_render_string(source, &params).unwrap();

    assert_eq!(render("{% assign secret = 1 %}{% include 'show.html' %}"), "[1]");
    assert_eq!(render("{% assign secret = 1 %}{% render 'show.html' %}"), "[]");
    assert_eq!(render("{% render 'show.html', extra: 'e' %}"), "[e]");
    assert_eq!(
        render("{% include 'product.html' with products[0] %}"),
        "<Hat>"
    );
    assert_eq!(
        render("{% for p in products %}{% include 'product.html' with p as product %}{% endfor %}"),
        "<Hat><Scarf><Gloves>"
    );
}

#[test]
fn test_recursive_include_is_bounded() {
    let mut engine = Engine::with_options(EngineOptions {
        max_include_depth: 5,
        ..EngineOptions::default()
    });
    engine.register_template_store(MemoryTemplateStore::with_templates([(
        "loop.html",
        "x{% include 'loop.html' %}",
    )]));
    let mut out = Vec::new();
    let template = engine.parse_template(b"{% include 'loop.html' %}").unwrap();
    let err = engine
        .render_to(&template, &mut out, &Bindings::new())
        .unwrap_err();
    assert!(matches!(err, TemplateError::RecursiveInclude { max_depth: 5, .. }), "{}", err);
    assert_eq!(String::from_utf8(out).unwrap(), "xxxxx");
}

#[test]
fn test_cancellation() {
    let engine = Engine::new();
    let template = engine.parse_template(b"a{{ x }}b").unwrap();
    let mut out = Vec::new();

    let cancel = AtomicBool::new(false);
    engine
        .render_to_cancellable(&template, &mut out, &bindings(), &cancel)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "a123b");

    let cancel = AtomicBool::new(true);
    let mut out = Vec::new();
    let err = engine
        .render_to_cancellable(&template, &mut out, &bindings(), &cancel)
        .unwrap_err();
    assert!(matches!(err, TemplateError::Cancelled));
    assert!(out.is_empty());
}

#[test]
fn test_template_renders_many_times() {
    let engine = Engine::new();
    let template = engine.parse_template(b"{{ n | times: 2 }}").unwrap();
    for n in 0..3i64 {
        let mut params = Bindings::new();
        params.insert("n".to_string(), Value::Int(n));
        assert_eq!(engine.render(&template, &params).unwrap(), (n * 2).to_string());
    }
}
