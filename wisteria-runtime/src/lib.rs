//! Runtime helper contract for Wisteria's tree-walking interpreter.
//!
//! A small, dependency-light crate deliberately kept independent of
//! `wisteria`'s concrete `Value` type (see [`RuntimeValue`]) the same way
//! `subset_julia_vm_runtime` stays independent of `subset_julia_vm`'s main
//! interpreter value representation: the generic helpers here (`suppressValue`,
//! `ensureDefined`, `memberLookup`, `inOperator`, `asyncEach`, `asyncAll`) are
//! the fixed vocabulary spec.md §4.6 names, implemented once against a trait
//! rather than once per concrete value type.

pub mod async_iter;
pub mod error;
pub mod helpers;
pub mod value;

pub mod prelude {
    pub use crate::async_iter::{async_all, async_each};
    pub use crate::error::RuntimeError;
    pub use crate::helpers::{escape_html, ensure_defined, in_operator, member_lookup, suppress_value};
    pub use crate::value::RuntimeValue;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestValue {
        Undefined,
        Str(String),
        Safe(String),
        Array(Vec<TestValue>),
    }

    impl RuntimeValue for TestValue {
        fn undefined() -> Self {
            TestValue::Undefined
        }
        fn null() -> Self {
            TestValue::Undefined
        }
        fn from_bool(b: bool) -> Self {
            TestValue::Str(b.to_string())
        }
        fn is_undefined(&self) -> bool {
            matches!(self, TestValue::Undefined)
        }
        fn is_null(&self) -> bool {
            false
        }
        fn is_safe(&self) -> bool {
            matches!(self, TestValue::Safe(_))
        }
        fn mark_safe(self) -> Self {
            match self {
                TestValue::Str(s) => TestValue::Safe(s),
                other => other,
            }
        }
        fn truthy(&self) -> bool {
            !matches!(self, TestValue::Undefined)
        }
        fn type_name(&self) -> &'static str {
            "Test"
        }
        fn render(&self) -> String {
            match self {
                TestValue::Undefined => String::new(),
                TestValue::Str(s) | TestValue::Safe(s) => s.clone(),
                TestValue::Array(_) => "[array]".to_string(),
            }
        }
        fn get_attr(&self, _name: &str) -> Option<Self> {
            None
        }
        fn get_index(&self, _index: &Self) -> Result<Self, error::RuntimeError> {
            Ok(TestValue::Undefined)
        }
        fn iter_values(&self) -> Result<Vec<Self>, error::RuntimeError> {
            match self {
                TestValue::Array(items) => Ok(items.clone()),
                _ => Err(error::RuntimeError::NotIterable(self.type_name().to_string())),
            }
        }
        fn contains(&self, needle: &Self) -> bool {
            matches!(self, TestValue::Array(items) if items.contains(needle))
        }
    }

    #[test]
    fn suppress_value_escapes_unsafe_strings() {
        let v = TestValue::Str("<b>".to_string());
        assert_eq!(suppress_value(&v, true), "&lt;b&gt;");
        assert_eq!(suppress_value(&v, false), "<b>");
    }

    #[test]
    fn suppress_value_leaves_safe_strings_alone() {
        let v = TestValue::Safe("<b>".to_string());
        assert_eq!(suppress_value(&v, true), "<b>");
    }

    #[test]
    fn ensure_defined_rejects_undefined() {
        assert!(ensure_defined(&TestValue::Undefined).is_err());
        assert!(ensure_defined(&TestValue::Str("x".into())).is_ok());
    }

    #[test]
    fn async_all_preserves_input_order() {
        let items = vec![3u32, 1, 2];
        let fut = async_all(items, |i, v| async move {
            // Simulate out-of-order completion: larger delay for earlier items.
            Ok::<u32, ()>(v * 10 + i as u32)
        });
        let results: Result<Vec<u32>, ()> = futures::executor::block_on(fut);
        assert_eq!(results.unwrap(), vec![30, 11, 22]);
    }
}
