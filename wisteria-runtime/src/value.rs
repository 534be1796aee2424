//! The [`RuntimeValue`] trait: the minimal vocabulary the generic helpers in
//! [`crate::helpers`] need from a host's concrete value type. `wisteria`'s
//! `Value` enum implements this so the interpreter can call these helpers
//! without `wisteria-runtime` depending back on `wisteria` (the same
//! direction-of-dependency the teacher keeps between `subset_julia_vm` and
//! `subset_julia_vm_runtime`).

use crate::error::RuntimeError;

pub trait RuntimeValue: Clone + std::fmt::Debug {
    fn undefined() -> Self;
    fn null() -> Self;
    fn from_bool(b: bool) -> Self;

    fn is_undefined(&self) -> bool;
    fn is_null(&self) -> bool;
    fn is_safe(&self) -> bool;
    fn mark_safe(self) -> Self;

    /// JS/Python-style truthiness: false/undefined/null/0/""/[]/{} are falsy.
    fn truthy(&self) -> bool;

    /// The value's type name, for error messages (`"Undefined"`, `"Array"`, …).
    fn type_name(&self) -> &'static str;

    /// String coercion used when appending to the output buffer.
    fn render(&self) -> String;

    /// Attribute/property lookup (`target.key`), used for `LookupVal` with a
    /// string key that isn't a numeric index.
    fn get_attr(&self, name: &str) -> Option<Self>;

    /// Index lookup (`target[key]`), used for `LookupVal` with a computed key.
    fn get_index(&self, index: &Self) -> Result<Self, RuntimeError>;

    /// Expands an iterable value (array, map, string) into an owned sequence
    /// of values, used by `For`/`asyncEach`/`asyncAll`.
    fn iter_values(&self) -> Result<Vec<Self>, RuntimeError>;

    /// `needle in haystack`, used by the `In` node.
    fn contains(&self, needle: &Self) -> bool;
}
