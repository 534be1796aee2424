//! Tests: boolean predicates invoked via `is` (GLOSSARY "Test"). Looked up
//! by `Environment::get_test`, called as `env.getTest(name).call(context,
//! left, …args) === true` (spec.md §4.5 "In / Is").

use std::collections::HashMap;
use std::fmt;

use crate::context::Context;
use crate::error::RenderResult;
use crate::value::Value;
use wisteria_runtime::RuntimeValue;

pub trait Test: fmt::Debug {
    fn call(&self, context: &Context, value: &Value, args: &[Value]) -> RenderResult<bool>;
}

struct FnTest<F>(F);
impl<F> fmt::Debug for FnTest<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTest").finish_non_exhaustive()
    }
}
impl<F> Test for FnTest<F>
where
    F: Fn(&Context, &Value, &[Value]) -> RenderResult<bool>,
{
    fn call(&self, context: &Context, value: &Value, args: &[Value]) -> RenderResult<bool> {
        (self.0)(context, value, args)
    }
}

fn boxed_fn(f: impl Fn(&Context, &Value, &[Value]) -> RenderResult<bool> + 'static) -> Box<dyn Test> {
    Box::new(FnTest(f))
}

/// The fixed set of tests registered on every new `Environment` — a bounded
/// subset of Jinja2/nunjucks' builtin tests (documented in DESIGN.md), not
/// full parity.
pub fn builtins() -> HashMap<String, Box<dyn Test>> {
    let mut m: HashMap<String, Box<dyn Test>> = HashMap::new();
    m.insert("defined".into(), boxed_fn(|_, v, _| Ok(!v.is_undefined())));
    m.insert("undefined".into(), boxed_fn(|_, v, _| Ok(v.is_undefined())));
    m.insert("none".into(), boxed_fn(|_, v, _| Ok(v.is_null())));
    m.insert("null".into(), boxed_fn(|_, v, _| Ok(v.is_null())));
    m.insert("string".into(), boxed_fn(|_, v, _| Ok(matches!(v, Value::Str(_) | Value::Safe(_)))));
    m.insert(
        "number".into(),
        boxed_fn(|_, v, _| Ok(matches!(v, Value::Int(_) | Value::Float(_)))),
    );
    m.insert("boolean".into(), boxed_fn(|_, v, _| Ok(matches!(v, Value::Bool(_)))));
    m.insert("true".into(), boxed_fn(|_, v, _| Ok(matches!(v, Value::Bool(true)))));
    m.insert("false".into(), boxed_fn(|_, v, _| Ok(matches!(v, Value::Bool(false)))));
    m.insert(
        "odd".into(),
        boxed_fn(|_, v, _| Ok(v.as_i64().map(|i| i % 2 != 0).unwrap_or(false))),
    );
    m.insert(
        "even".into(),
        boxed_fn(|_, v, _| Ok(v.as_i64().map(|i| i % 2 == 0).unwrap_or(false))),
    );
    m.insert(
        "divisibleby".into(),
        boxed_fn(|_, v, args| {
            let n = args.first().and_then(Value::as_i64).unwrap_or(1);
            Ok(v.as_i64().map(|i| n != 0 && i % n == 0).unwrap_or(false))
        }),
    );
    m.insert(
        "iterable".into(),
        boxed_fn(|_, v, _| Ok(matches!(v, Value::Array(_) | Value::Map(_) | Value::KeywordArgs(_) | Value::Str(_)))),
    );
    m.insert(
        "mapping".into(),
        boxed_fn(|_, v, _| Ok(matches!(v, Value::Map(_) | Value::KeywordArgs(_)))),
    );
    m.insert("sameas".into(), boxed_fn(|_, v, args| Ok(args.first().is_some_and(|o| v.loose_eq(o)))));
    m
}
