//! Extensions: host-supplied callables invoked for custom tags, optionally
//! consuming content-block thunks (GLOSSARY "Extension"). Registered on
//! `Environment` and looked up via `env.getExtension(name)` (spec.md §4.5
//! "CallExtension").

use std::fmt;

use futures::future::LocalBoxFuture;

use crate::context::Context;
use crate::error::RenderResult;
use crate::value::Value;

/// Content blocks attached to a `{% call %}`-shaped extension tag are
/// rendered to text eagerly, before the extension is invoked, rather than
/// passed as lazy closures — an extension only ever needs the rendered
/// text, never multiple independent invocations of the same block.
pub trait Extension: fmt::Debug {
    /// `prop` is the method name the tag invoked — `{% ext.prop(...) %}` —
    /// since one extension commonly exposes more than one entry point
    /// (spec.md §4.5 "CallExtension").
    fn call(
        &self,
        context: &Context,
        prop: &str,
        args: &[Value],
        content: &[String],
        autoescape: bool,
    ) -> RenderResult<Value>;
}

pub trait AsyncExtension: fmt::Debug {
    fn call<'a>(
        &'a self,
        context: &'a Context,
        prop: &'a str,
        args: &'a [Value],
        content: &'a [String],
        autoescape: bool,
    ) -> LocalBoxFuture<'a, RenderResult<Value>>;
}
