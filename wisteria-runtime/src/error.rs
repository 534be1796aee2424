//! Errors a [`crate::RuntimeValue`] implementation or a helper function may
//! raise. Mirrors `subset_julia_vm_runtime::error::RuntimeError`'s shape
//! (plain `thiserror` enum, one variant per failure kind the dynamic
//! dispatch helpers in `dispatch.rs` can hit) but scoped to the handful of
//! failures generic value/member/iteration helpers can produce.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    #[error("'{0}' is undefined")]
    Undefined(String),

    #[error("attempted to call a non-callable value of type {0}")]
    NotCallable(String),

    #[error("key {0:?} not found")]
    KeyNotFound(String),

    #[error("index {index} out of bounds for a value of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("value of type {0} is not iterable")]
    NotIterable(String),

    #[error("type error: {0}")]
    TypeError(String),
}
