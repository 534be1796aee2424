//! Filters: unary/n-ary functions applied with `|`, sync or async (GLOSSARY
//! "Filter"). `Environment::get_filter`/`get_async_filter` look these up by
//! name at render time (spec.md §4.5 "Filter"/"FilterAsync").

use std::collections::HashMap;
use std::fmt;

use futures::future::LocalBoxFuture;

use crate::context::Context;
use crate::error::{RenderError, RenderResult};
use crate::value::Value;
use wisteria_runtime::RuntimeValue;

pub trait Filter: fmt::Debug {
    fn call(&self, context: &Context, args: &[Value]) -> RenderResult<Value>;
}

pub trait AsyncFilter: fmt::Debug {
    fn call<'a>(&'a self, context: &'a Context, args: &'a [Value]) -> LocalBoxFuture<'a, RenderResult<Value>>;
}

struct FnFilter<F>(F);
impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").finish_non_exhaustive()
    }
}
impl<F> Filter for FnFilter<F>
where
    F: Fn(&Context, &[Value]) -> RenderResult<Value>,
{
    fn call(&self, context: &Context, args: &[Value]) -> RenderResult<Value> {
        (self.0)(context, args)
    }
}

pub fn boxed_fn(f: impl Fn(&Context, &[Value]) -> RenderResult<Value> + 'static) -> Box<dyn Filter> {
    Box::new(FnFilter(f))
}

struct FnAsyncFilter<F>(F);
impl<F> fmt::Debug for FnAsyncFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAsyncFilter").finish_non_exhaustive()
    }
}
impl<F> AsyncFilter for FnAsyncFilter<F>
where
    F: for<'a> Fn(&'a Context, &'a [Value]) -> LocalBoxFuture<'a, RenderResult<Value>>,
{
    fn call<'a>(&'a self, context: &'a Context, args: &'a [Value]) -> LocalBoxFuture<'a, RenderResult<Value>> {
        (self.0)(context, args)
    }
}

pub fn boxed_async_fn(
    f: impl for<'a> Fn(&'a Context, &'a [Value]) -> LocalBoxFuture<'a, RenderResult<Value>> + 'static,
) -> Box<dyn AsyncFilter> {
    Box::new(FnAsyncFilter(f))
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

/// The fixed set of filters registered on every new `Environment` — a
/// deliberately bounded subset of Jinja2/nunjucks' builtin filter set
/// (documented as such in DESIGN.md), not full parity.
pub fn builtins() -> HashMap<String, Box<dyn Filter>> {
    let mut m: HashMap<String, Box<dyn Filter>> = HashMap::new();
    m.insert("safe".into(), boxed_fn(|_, args| Ok(arg(args, 0).mark_safe())));
    m.insert(
        "upper".into(),
        boxed_fn(|_, args| Ok(Value::str(arg(args, 0).render().to_uppercase()))),
    );
    m.insert(
        "lower".into(),
        boxed_fn(|_, args| Ok(Value::str(arg(args, 0).render().to_lowercase()))),
    );
    m.insert(
        "default".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            if v.is_undefined() || v.is_null() {
                Ok(arg(args, 1))
            } else {
                Ok(v)
            }
        }),
    );
    m.insert(
        "length".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            let len = match &v {
                Value::Array(items) => items.len(),
                Value::Map(map) | Value::KeywordArgs(map) => map.len(),
                Value::Str(s) | Value::Safe(s) => s.chars().count(),
                _ => return Err(length_type_error(&v)),
            };
            Ok(Value::Int(len as i64))
        }),
    );
    m.insert(
        "first".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            match v {
                Value::Array(items) => Ok(items.into_iter().next().unwrap_or(Value::Undefined)),
                Value::Str(s) | Value::Safe(s) => {
                    Ok(s.chars().next().map(|c| Value::str(c.to_string())).unwrap_or(Value::Undefined))
                }
                other => Err(not_iterable(&other)),
            }
        }),
    );
    m.insert(
        "last".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            match v {
                Value::Array(items) => Ok(items.into_iter().next_back().unwrap_or(Value::Undefined)),
                Value::Str(s) | Value::Safe(s) => {
                    Ok(s.chars().next_back().map(|c| Value::str(c.to_string())).unwrap_or(Value::Undefined))
                }
                other => Err(not_iterable(&other)),
            }
        }),
    );
    m.insert(
        "join".into(),
        boxed_fn(|_, args| {
            let sep = args.get(1).and_then(Value::as_str).unwrap_or("").to_string();
            match arg(args, 0) {
                Value::Array(items) => {
                    Ok(Value::str(items.iter().map(|v| v.render()).collect::<Vec<_>>().join(&sep)))
                }
                other => Err(not_iterable(&other)),
            }
        }),
    );
    m.insert(
        "trim".into(),
        boxed_fn(|_, args| Ok(Value::str(arg(args, 0).render().trim().to_string()))),
    );
    m.insert(
        "title".into(),
        boxed_fn(|_, args| Ok(Value::str(title_case(&arg(args, 0).render())))),
    );
    m.insert(
        "capitalize".into(),
        boxed_fn(|_, args| Ok(Value::str(capitalize(&arg(args, 0).render())))),
    );
    m.insert(
        "escape".into(),
        boxed_fn(|_, args| Ok(Value::Safe(wisteria_runtime::escape_html(&arg(args, 0).render())))),
    );
    m.insert(
        "int".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            let default = args.get(1).and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::Int(v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())).unwrap_or(default)))
        }),
    );
    m.insert(
        "float".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            let default = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::Float(v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())).unwrap_or(default)))
        }),
    );
    m.insert("string".into(), boxed_fn(|_, args| Ok(Value::str(arg(args, 0).render()))));
    m.insert(
        "abs".into(),
        boxed_fn(|_, args| match arg(args, 0) {
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(length_type_error(&other)),
        }),
    );
    m.insert(
        "round".into(),
        boxed_fn(|_, args| {
            let f = arg(args, 0).as_f64().unwrap_or(0.0);
            let precision = args.get(1).and_then(Value::as_i64).unwrap_or(0) as i32;
            let factor = 10f64.powi(precision);
            Ok(Value::Float((f * factor).round() / factor))
        }),
    );
    m.insert(
        "list".into(),
        boxed_fn(|_, args| {
            let v = arg(args, 0);
            let items = v.iter_values().map_err(|e| crate::error::runtime_err(e, wisteria_parser::Span::empty()))?;
            Ok(Value::Array(items))
        }),
    );
    m.insert(
        "reverse".into(),
        boxed_fn(|_, args| match arg(args, 0) {
            Value::Array(mut items) => {
                items.reverse();
                Ok(Value::Array(items))
            }
            Value::Str(s) | Value::Safe(s) => Ok(Value::str(s.chars().rev().collect::<String>())),
            other => Err(not_iterable(&other)),
        }),
    );
    m.insert(
        "sort".into(),
        boxed_fn(|_, args| match arg(args, 0) {
            Value::Array(mut items) => {
                items.sort_by(|a, b| {
                    a.partial_cmp_loose(b).unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(Value::Array(items))
            }
            other => Err(not_iterable(&other)),
        }),
    );
    m.insert(
        "replace".into(),
        boxed_fn(|_, args| {
            let s = arg(args, 0).render();
            let from = args.get(1).and_then(Value::as_str).unwrap_or("").to_string();
            let to = args.get(2).and_then(Value::as_str).unwrap_or("").to_string();
            Ok(Value::str(s.replace(&from, &to)))
        }),
    );
    m
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn length_type_error(v: &Value) -> RenderError {
    RenderError::TypeError {
        message: format!("value of type {} has no length", v.type_name()),
        span: wisteria_parser::Span::empty(),
    }
}

fn not_iterable(v: &Value) -> RenderError {
    RenderError::TypeError {
        message: format!("value of type {} is not iterable", v.type_name()),
        span: wisteria_parser::Span::empty(),
    }
}
