//! Error kinds, per spec.md §7. Lex/parse errors are `wisteria_parser::ParseError`
//! (re-exported as [`ParseError`]); `CompileError` and `RenderError` are
//! defined here, mirroring `subset_julia_vm_parser::error::ParseError` and
//! `subset_julia_vm::compile::types`'s compile-error shape: a `thiserror`
//! enum carrying a [`Span`] plus a `format_with_context` pretty-printer.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use wisteria_parser::Span;

pub use wisteria_parser::ParseError as LexError;
pub use wisteria_parser::ParseError;

/// Errors raised while lowering the AST into IR (duplicate block names,
/// non-string dict keys caught again at this layer, bad async-filter
/// wiring). Parser-layer checks already reject most syntax-level problems;
/// `CompileError` covers semantic checks that need the whole tree in view.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("duplicate block name '{name}' at {span:?}")]
    DuplicateBlock { name: String, span: Span },

    #[error("dict keys must be string literals or bare names at {span:?}")]
    NonStringDictKey { span: Span },

    #[error("more than one 'extends' tag is not permitted at {span:?}")]
    MultipleExtends { span: Span },

    #[error("'{name}' is called as a function but is not callable at {span:?}")]
    NotCallableAtCompileTime { name: String, span: Span },

    #[error("'super()' called outside of a block at {span:?}")]
    SuperOutsideBlock { span: Span },
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::DuplicateBlock { span, .. }
            | CompileError::NonStringDictKey { span, .. }
            | CompileError::MultipleExtends { span, .. }
            | CompileError::NotCallableAtCompileTime { span, .. }
            | CompileError::SuperOutsideBlock { span, .. } => *span,
        }
    }
}

/// Errors raised during rendering. Carries enough context to surface at
/// template coordinates (spec.md §7's per-kind `(message, line, column,
/// templateName?)` contract).
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("'{name}' is undefined at {span:?}")]
    Undefined { name: String, span: Span },

    #[error("attempted to call a non-callable value of type {type_name} at {span:?}")]
    NotCallable { type_name: String, span: Span },

    #[error("filter '{name}' is not registered at {span:?}")]
    UnknownFilter { name: String, span: Span },

    #[error("test '{name}' is not registered at {span:?}")]
    UnknownTest { name: String, span: Span },

    #[error("extension '{name}' is not registered at {span:?}")]
    UnknownExtension { name: String, span: Span },

    #[error("block '{name}' is not defined at {span:?}")]
    UnknownBlock { name: String, span: Span },

    #[error("cannot import '{name}' from '{template}': not exported at {span:?}")]
    MissingImport {
        name: String,
        template: String,
        span: Span,
    },

    #[error("template '{name}' not found")]
    TemplateNotFound { name: String },

    #[error("template requires async rendering (contains an async suspension point)")]
    SyncOnly,

    #[error("{message} at {span:?}")]
    TypeError { message: String, span: Span },

    /// A non-template error (from a filter/test/extension/macro) wrapped
    /// with the call-site span, per spec.md §7's `handleError` contract.
    /// Skipped when the inner error already carries its own span (see
    /// [`RenderError::already_spanned`]).
    #[error("{source} at {span:?}")]
    Wrapped {
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
        span: Span,
    },
}

impl RenderError {
    pub fn span(&self) -> Option<Span> {
        match self {
            RenderError::Undefined { span, .. }
            | RenderError::NotCallable { span, .. }
            | RenderError::UnknownFilter { span, .. }
            | RenderError::UnknownTest { span, .. }
            | RenderError::UnknownExtension { span, .. }
            | RenderError::UnknownBlock { span, .. }
            | RenderError::MissingImport { span, .. }
            | RenderError::TypeError { span, .. }
            | RenderError::Wrapped { span, .. } => Some(*span),
            RenderError::TemplateNotFound { .. } | RenderError::SyncOnly => None,
        }
    }

    /// `runtime.handleError(e, line, col)`: wraps a foreign error with a
    /// template span, unless it is already a `RenderError` (already carries
    /// its own, innermost span) in which case it passes through unchanged.
    pub fn handle_error(
        e: Box<dyn std::error::Error + Send + Sync>,
        span: Span,
    ) -> RenderError {
        match e.downcast::<RenderError>() {
            Ok(already) => *already,
            Err(e) => RenderError::Wrapped { source: Arc::from(e), span },
        }
    }
}

/// Attaches a template span to a [`wisteria_runtime::RuntimeError`] raised by
/// a generic helper (`memberLookup`, `iter_values`, …), producing a real
/// [`RenderError`].
pub fn runtime_err(e: wisteria_runtime::RuntimeError, span: Span) -> RenderError {
    RenderError::TypeError {
        message: e.to_string(),
        span,
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_pass_through_when_already_spanned() {
        let inner = RenderError::Undefined {
            name: "x".into(),
            span: Span::empty(),
        };
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(inner);
        let wrapped = RenderError::handle_error(boxed, Span::new(1, 2, 1, 1, 2, 3));
        assert!(matches!(wrapped, RenderError::Undefined { .. }));
    }

    #[test]
    fn wrapped_errors_attach_span_when_foreign() {
        #[derive(Debug)]
        struct Oops;
        impl fmt::Display for Oops {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "oops")
            }
        }
        impl std::error::Error for Oops {}
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(Oops);
        let span = Span::new(1, 2, 3, 3, 4, 5);
        let wrapped = RenderError::handle_error(boxed, span);
        assert!(matches!(wrapped, RenderError::Wrapped { .. }));
        assert_eq!(wrapped.span(), Some(span));
    }
}
