//! The fixed vocabulary of render-time helper operations consumed by the
//! interpreter, generic over any [`RuntimeValue`] implementation.

use crate::error::RuntimeError;
use crate::value::RuntimeValue;

/// HTML-escapes `&`, `<`, `>`, `"`, `'`.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `runtime.suppressValue(v, autoescape)`: render `v` to text, HTML-escaping
/// it unless `autoescape` is off or `v` is already marked safe.
pub fn suppress_value<V: RuntimeValue>(v: &V, autoescape: bool) -> String {
    let text = v.render();
    if autoescape && !v.is_safe() {
        escape_html(&text)
    } else {
        text
    }
}

/// `runtime.ensureDefined(v, line, col)`: the caller is expected to turn this
/// into a spanned `RenderError` when `throwOnUndefined` is set.
pub fn ensure_defined<V: RuntimeValue>(v: &V) -> Result<(), RuntimeError> {
    if v.is_undefined() || v.is_null() {
        Err(RuntimeError::Undefined(v.type_name().to_string()))
    } else {
        Ok(())
    }
}

/// `runtime.inOperator(needle, haystack)`.
pub fn in_operator<V: RuntimeValue>(needle: &V, haystack: &V) -> bool {
    haystack.contains(needle)
}

/// `runtime.memberLookup(obj, key)` for a string key (attribute-style access;
/// falls back to `None` so the caller can decide whether that's undefined or
/// an index lookup).
pub fn member_lookup<V: RuntimeValue>(obj: &V, key: &str) -> Option<V> {
    obj.get_attr(key)
}
