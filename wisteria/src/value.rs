//! The runtime data-context value. Grounded on `subset_julia_vm::vm::value`'s
//! tagged `Value` enum (one variant per dynamic shape the interpreter needs
//! to branch on), narrowed to the handful of shapes a template context
//! actually carries: JSON-ish scalars/aggregates, a dedicated safe-string
//! marker (spec.md §9 Design Notes: "implement as a dedicated variant ...
//! rather than a mutable attribute"), a dedicated keyword-args variant (same
//! note, for the `__keywords` marker), and macro/native callables.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use wisteria_runtime::RuntimeValue;

use crate::error::RenderError;
use crate::frame::Frame;
use crate::ir::Op;

/// A compiled `{% macro %}` or `{% call %}` block, callable with a mix of
/// positional and keyword arguments (spec.md §4.5 "Macro").
pub struct MacroValue {
    pub name: String,
    pub arg_names: Vec<String>,
    /// Default value expression per argument, `None` for required args.
    pub defaults: Vec<Option<Rc<Op>>>,
    pub body: Rc<Op>,
    /// The lexical frame the macro closes over, captured at definition time.
    pub closure_frame: Frame<Value>,
}

impl fmt::Debug for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroValue")
            .field("name", &self.name)
            .field("arg_names", &self.arg_names)
            .finish_non_exhaustive()
    }
}

/// A host-supplied synchronous function exposed as a template global. The
/// trailing element of `args` is a `Value::KeywordArgs` when the call site
/// supplied keyword arguments, matching `makeKeywordArgs`'s convention of
/// folding kwargs into the positional argument list.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, RenderError>;

pub struct NativeValue {
    pub name: String,
    pub func: Rc<NativeFn>,
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeValue").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A string marked so autoescape must not re-escape it (GLOSSARY: SafeString).
    Safe(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A dict literal flagged as keyword arguments at a call site (spec.md
    /// §3 invariant: "the last positional argument to a call is treated as
    /// keyword-args iff flagged").
    KeywordArgs(IndexMap<String, Value>),
    Macro(Rc<MacroValue>),
    Native(Rc<NativeValue>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(items)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Safe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_keyword_args(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::KeywordArgs(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_keyword_args(&self) -> bool {
        matches!(self, Value::KeywordArgs(_))
    }

    /// Splits a FunCall/Filter-style argument list into (positional,
    /// trailing keyword args), per spec.md §3's trailing-kwargs invariant.
    pub fn split_trailing_kwargs(args: &[Value]) -> (&[Value], Option<&IndexMap<String, Value>>) {
        match args.last() {
            Some(Value::KeywordArgs(map)) => (&args[..args.len() - 1], Some(map)),
            _ => (args, None),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }

    /// Julia/JS/Python-flavoured equality used by `==`/`!=` and `is sameas`
    /// fallback: compares by value, not identity, for everything but callables.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
            (Str(a) | Safe(a), Str(b) | Safe(b)) => a == b,
            (Array(a), Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y)),
            (Map(a), Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.loose_eq(bv)))
            }
            _ => false,
        }
    }

    pub fn partial_cmp_loose(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => Some(a.cmp(b)),
                _ => None,
            },
        }
    }
}

impl RuntimeValue for Value {
    fn undefined() -> Self {
        Value::Undefined
    }

    fn null() -> Self {
        Value::Null
    }

    fn from_bool(b: bool) -> Self {
        Value::Bool(b)
    }

    fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn is_safe(&self) -> bool {
        matches!(self, Value::Safe(_))
    }

    fn mark_safe(self) -> Self {
        match self {
            Value::Str(s) => Value::Safe(s),
            other => other,
        }
    }

    /// JS/nunjucks-style truthiness: false/undefined/null/0/""/[]/{} are falsy.
    fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) | Value::Safe(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(map) | Value::KeywordArgs(map) => !map.is_empty(),
            Value::Macro(_) | Value::Native(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) | Value::Safe(_) => "String",
            Value::Array(_) => "Array",
            Value::Map(_) => "Object",
            Value::KeywordArgs(_) => "KeywordArgs",
            Value::Macro(_) => "Macro",
            Value::Native(_) => "Function",
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) | Value::Safe(s) => s.clone(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.render()).collect();
                parts.join(",")
            }
            Value::Map(map) | Value::KeywordArgs(map) => {
                let parts: Vec<String> =
                    map.iter().map(|(k, v)| format!("{}: {}", k, v.render())).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Macro(m) => format!("[macro {}]", m.name),
            Value::Native(n) => format!("[function {}]", n.name),
        }
    }

    fn get_attr(&self, name: &str) -> Option<Self> {
        match self {
            Value::Map(map) | Value::KeywordArgs(map) => map.get(name).cloned(),
            Value::Array(items) if name == "length" => Some(Value::Int(items.len() as i64)),
            Value::Str(s) | Value::Safe(s) if name == "length" => {
                Some(Value::Int(s.chars().count() as i64))
            }
            _ => None,
        }
    }

    fn get_index(&self, index: &Self) -> Result<Self, wisteria_runtime::RuntimeError> {
        use wisteria_runtime::RuntimeError;
        match self {
            Value::Array(items) => {
                let i = index
                    .as_i64()
                    .ok_or_else(|| RuntimeError::TypeError("array index must be a number".into()))?;
                let idx = if i < 0 { items.len() as i64 + i } else { i };
                if idx < 0 || idx as usize >= items.len() {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index: i,
                        len: items.len(),
                    });
                }
                Ok(items[idx as usize].clone())
            }
            Value::Map(map) | Value::KeywordArgs(map) => {
                let key = index
                    .as_str()
                    .ok_or_else(|| RuntimeError::TypeError("object key must be a string".into()))?;
                Ok(map.get(key).cloned().unwrap_or(Value::Undefined))
            }
            Value::Str(s) | Value::Safe(s) => {
                let i = index
                    .as_i64()
                    .ok_or_else(|| RuntimeError::TypeError("string index must be a number".into()))?;
                Ok(s.chars()
                    .nth(i.max(0) as usize)
                    .map(|c| Value::Str(c.to_string()))
                    .unwrap_or(Value::Undefined))
            }
            Value::Undefined | Value::Null => Ok(Value::Undefined),
            _ => Err(RuntimeError::TypeError(format!(
                "value of type {} is not indexable",
                self.type_name()
            ))),
        }
    }

    fn iter_values(&self) -> Result<Vec<Self>, wisteria_runtime::RuntimeError> {
        use wisteria_runtime::RuntimeError;
        match self {
            Value::Array(items) => Ok(items.clone()),
            Value::Map(map) | Value::KeywordArgs(map) => {
                Ok(map.keys().map(|k| Value::Str(k.clone())).collect())
            }
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(RuntimeError::NotIterable(other.type_name().to_string())),
        }
    }

    fn contains(&self, needle: &Self) -> bool {
        match self {
            Value::Array(items) => items.iter().any(|v| v.loose_eq(needle)),
            Value::Map(map) | Value::KeywordArgs(map) => {
                needle.as_str().is_some_and(|k| map.contains_key(k))
            }
            Value::Str(s) => needle.as_str().is_some_and(|n| s.contains(n)),
            _ => false,
        }
    }
}

/// Render a float the way JS/nunjucks templates do: integral floats lose
/// their trailing `.0`.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_js_semantics() {
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::Array(vec![]).truthy());
        assert!(Value::Int(1).truthy());
        assert!(Value::Str("x".into()).truthy());
    }

    #[test]
    fn safe_marker_is_dedicated_variant() {
        let v = Value::Str("<b>".into()).mark_safe();
        assert!(matches!(v, Value::Safe(_)));
    }

    #[test]
    fn from_json_round_trips_scalars() {
        let v = Value::from_json(serde_json::json!({"a": 1, "b": [1,2,3], "c": "x"}));
        assert!(matches!(v, Value::Map(_)));
    }

    #[test]
    fn float_render_drops_trailing_zero() {
        assert_eq!(Value::Float(2.0).render(), "2");
        assert_eq!(Value::Float(2.5).render(), "2.5");
    }
}
