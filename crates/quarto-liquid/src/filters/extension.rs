/*
 * filters/extension.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Extension filters: base64 and jq.

use crate::config::{ConfigBuilder, FilterDef};
use crate::convert::Shape;
use crate::error::FilterError;
use crate::value::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;

/// Register `base64_encode`, `base64_decode` and `jq`.
pub fn register_extension_filters(builder: &mut ConfigBuilder) {
    builder
        .add_filter(FilterDef::new("base64_encode", vec![Shape::String], |args, _| {
            Ok(Value::String(STANDARD.encode(input_text(args))))
        }))
        .add_filter(FilterDef::new("base64_decode", vec![Shape::String], |args, _| {
            let bytes = STANDARD
                .decode(input_text(args))
                .map_err(|e| FilterError::new(format!("invalid base64 input: {}", e)))?;
            Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        }))
        .add_filter(FilterDef::new("jq", vec![Shape::Any, Shape::String], |args, _| {
            let input = args.first().cloned().unwrap_or_default();
            let filter = args.get(1).and_then(Value::as_str).unwrap_or_default();
            jq(&input, filter)
        }));
}

fn input_text(args: &[Value]) -> &str {
    args.first().and_then(Value::as_str).unwrap_or_default()
}

/// Run a jq program over `input`.
///
/// A string input is parsed as JSON text; anything else is converted to
/// JSON directly. Null results are dropped and evaluation stops at the
/// first runtime error. No results gives nil, one result gives that value
/// and several give a list.
fn jq(input: &Value, filter: &str) -> Result<Value, FilterError> {
    let json = match input {
        Value::Nil => serde_json::Value::Null,
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| FilterError::new(format!("jq input is not valid JSON: {}", e)))?,
        other => other.to_json(),
    };

    let invalid = |count: usize| {
        FilterError::new(format!(
            "the jq filter string '{}' is not valid: {} error(s)",
            filter, count
        ))
    };

    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let program = File {
        code: filter,
        path: (),
    };
    let modules = loader.load(&arena, program).map_err(|errs| invalid(errs.len()))?;
    let compiled = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| invalid(errs.len()))?;

    let inputs = RcIter::new(core::iter::empty());
    let mut results = Vec::new();
    for output in compiled.run((Ctx::new([], &inputs), Val::from(json))) {
        let Ok(val) = output else { break };
        let value: serde_json::Value = serde_json::from_str(&val.to_string())
            .map_err(|e| FilterError::new(format!("jq produced invalid JSON: {}", e)))?;
        if !value.is_null() {
            results.push(Value::from(value));
        }
    }

    tracing::trace!(filter, results = results.len(), "Evaluated jq filter");

    Ok(match results.len() {
        0 => Value::Nil,
        1 => results.swap_remove(0),
        _ => Value::List(results),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> crate::error::TemplateResult<Value> {
        let mut builder = Config::builder();
        register_extension_filters(&mut builder);
        let config = builder.build();
        config.filter(name).unwrap().call(args, &Map::new())
    }

    #[test]
    fn test_base64() {
        assert_eq!(
            call("base64_encode", vec!["The Best Page Ever!".into()]).unwrap(),
            "VGhlIEJlc3QgUGFnZSBFdmVyIQ==".into()
        );
        assert_eq!(
            call("base64_decode", vec!["VGhlIEJlc3QgUGFnZSBFdmVyIQ==".into()]).unwrap(),
            "The Best Page Ever!".into()
        );
        assert!(call("base64_decode", vec!["not base64!".into()]).is_err());
    }

    #[test]
    fn test_jq_on_json_text() {
        let input = Value::from(r#"{"values":{"testa":"alpha","testb":"beta"}}"#);
        assert_eq!(
            call("jq", vec![input.clone(), ".values.testb".into()]).unwrap(),
            "beta".into()
        );
        assert_eq!(call("jq", vec![input.clone(), ".missing".into()]).unwrap(), Value::Nil);
        assert_eq!(
            call("jq", vec![input, ".values[]".into()]).unwrap(),
            Value::List(vec!["alpha".into(), "beta".into()])
        );
    }

    #[test]
    fn test_jq_on_values() {
        let input: Value = serde_json::json!({"n": [1, 2, 3]}).into();
        assert_eq!(call("jq", vec![input, ".n | length".into()]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_jq_invalid_filter() {
        let err = call("jq", vec![Value::Nil, ".[".into()]).unwrap_err();
        assert!(err.to_string().contains("is not valid"));
    }
}
