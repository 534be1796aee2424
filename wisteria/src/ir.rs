//! The compiled intermediate representation the interpreter executes.
//!
//! Per SPEC_FULL.md §2, the "IR text" spec.md §2 item 6/§4.5 describes is
//! realized here as a typed tree (`Op`) rather than source handed to a
//! foreign evaluator — spec.md §9 Design Notes explicitly sanctions this
//! ("An implementer may equivalently emit IR over a Future/coroutine
//! abstraction"). `Op` carries one variant per "emit ..." instruction in
//! spec.md §4.5; [`crate::exec`]'s handling of each variant *is* that
//! emission rule, restated as an evaluation rule instead of a codegen rule.
//!
//! Grounded on `subset_julia_vm::aot::ir::ops` for the general shape of "one
//! tagged-enum op per source construct, spans carried alongside".

use std::rc::Rc;

use wisteria_parser::ast::{BinOp, CompareOpKind, ForMode, ForTarget, UnaryOp};
use wisteria_parser::Span;

use crate::value::Value;

/// `{% from "tpl" import name [as alias] %}`.
#[derive(Debug, Clone)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

/// One formal argument of a `{% macro %}` or `{% call(...) %}` block.
#[derive(Debug, Clone)]
pub struct MacroArgSpec {
    pub name: String,
    pub default: Option<Rc<Op>>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Op,
    /// Empty body means fall through to the next case — spec.md §9's
    /// documented open question, preserved verbatim; see
    /// `crate::compiler::stmt::compile_switch`.
    pub body: Op,
}

/// The compiled IR. One variant per spec.md §4.5 emission rule.
#[derive(Debug, Clone)]
pub enum Op {
    /// Raw template text, appended to the output buffer verbatim.
    Text(String),
    /// `{{ expr }}`: `runtime.suppressValue(expr, env.opts.autoescape)`,
    /// wrapped in `runtime.ensureDefined` when `throwOnUndefined` is set.
    Output { expr: Box<Op>, span: Span },
    Seq(Vec<Op>),

    // ---- expression leaves ----
    Literal(Value),
    /// Looked up via the frame chain, falling back to the context.
    Symbol { name: String, span: Span },

    // ---- aggregates ----
    Array(Vec<Op>, Span),
    /// Keys are always string literals per spec.md §3's dict-key invariant;
    /// enforced by the compiler before this IR is produced.
    Dict(Vec<(String, Op)>, Span),

    // ---- operators ----
    BinOp {
        op: BinOp,
        left: Box<Op>,
        right: Box<Op>,
        span: Span,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Op>,
        span: Span,
    },
    Compare {
        expr: Box<Op>,
        ops: Vec<(CompareOpKind, Op)>,
        span: Span,
    },
    In {
        negated: bool,
        left: Box<Op>,
        right: Box<Op>,
        span: Span,
    },
    Is {
        negated: bool,
        left: Box<Op>,
        name: String,
        args: Vec<Op>,
        span: Span,
    },

    // ---- access/call ----
    LookupVal {
        target: Box<Op>,
        value: Box<Op>,
        span: Span,
    },
    FunCall {
        callee: Box<Op>,
        args: Vec<Op>,
        span: Span,
    },
    /// `env.getFilter(name).call(context, ...args)`. The transformer never
    /// rewrites these — only filters registered as async become
    /// `FilterAsync`.
    Filter {
        name: String,
        args: Vec<Op>,
        span: Span,
    },
    /// A suspension point introduced by the transformer (spec.md §4.3):
    /// `env.getFilter(name).call(...)` awaited, with the rest of the
    /// enclosing expression referencing `symbol`.
    FilterAsync {
        name: String,
        args: Vec<Op>,
        symbol: String,
        span: Span,
    },
    KeywordArgs(Vec<(String, Op)>, Span),

    // ---- control ----
    If {
        cond: Box<Op>,
        body: Box<Op>,
        else_: Option<Box<Op>>,
        span: Span,
    },
    InlineIf {
        cond: Box<Op>,
        body: Box<Op>,
        else_: Option<Box<Op>>,
        span: Span,
    },
    Switch {
        expr: Box<Op>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Op>>,
        span: Span,
    },
    For {
        mode: ForMode,
        arr: Box<Op>,
        target: ForTarget,
        body: Rc<Op>,
        else_: Option<Box<Op>>,
        span: Span,
    },
    Set {
        targets: Vec<String>,
        value: Box<Op>,
        span: Span,
    },

    // ---- structure ----
    /// A named template region. Execution always defers to
    /// `context.getBlock(name)` so inheritance overrides resolve (spec.md
    /// §4.5 "Block"); `body` is this template's own implementation, which
    /// the renderer registers into the context before the root body runs.
    Block { name: String, body: Rc<Op>, span: Span },
    Super { block_name: String, span: Span },
    Extends { template: Box<Op>, span: Span },
    Include {
        template: Box<Op>,
        ignore_missing: bool,
        span: Span,
    },
    Import {
        template: Box<Op>,
        target: String,
        with_context: bool,
        span: Span,
    },
    FromImport {
        template: Box<Op>,
        names: Vec<ImportName>,
        with_context: bool,
        span: Span,
    },
    Macro {
        name: String,
        args: Vec<MacroArgSpec>,
        body: Rc<Op>,
        span: Span,
    },
    CallBlock {
        call_args: Vec<MacroArgSpec>,
        callee: Box<Op>,
        body: Rc<Op>,
        span: Span,
    },
    Capture { body: Box<Op>, span: Span },
    CallExtension {
        ext_name: String,
        prop: String,
        args: Vec<Op>,
        content_args: Vec<Rc<Op>>,
        autoescape: bool,
        is_async: bool,
        span: Span,
    },
}

impl Op {
    pub fn span(&self) -> Span {
        match self {
            Op::Text(_) => Span::empty(),
            Op::Output { span, .. }
            | Op::Symbol { span, .. }
            | Op::Array(_, span)
            | Op::Dict(_, span)
            | Op::BinOp { span, .. }
            | Op::UnaryOp { span, .. }
            | Op::Compare { span, .. }
            | Op::In { span, .. }
            | Op::Is { span, .. }
            | Op::LookupVal { span, .. }
            | Op::FunCall { span, .. }
            | Op::Filter { span, .. }
            | Op::FilterAsync { span, .. }
            | Op::KeywordArgs(_, span)
            | Op::If { span, .. }
            | Op::InlineIf { span, .. }
            | Op::Switch { span, .. }
            | Op::For { span, .. }
            | Op::Set { span, .. }
            | Op::Block { span, .. }
            | Op::Super { span, .. }
            | Op::Extends { span, .. }
            | Op::Include { span, .. }
            | Op::Import { span, .. }
            | Op::FromImport { span, .. }
            | Op::Macro { span, .. }
            | Op::CallBlock { span, .. }
            | Op::Capture { span, .. }
            | Op::CallExtension { span, .. } => *span,
            Op::Literal(_) => Span::empty(),
            Op::Seq(children) => children.first().map(|c| c.span()).unwrap_or_else(Span::empty),
        }
    }

    /// True if this node (or, for an aggregate, any descendant) contains an
    /// async suspension point — a `FilterAsync`, an `AsyncEach`/`AsyncAll`
    /// `For`, or an async `CallExtension`. Used by [`crate::template::Template`]
    /// to decide whether `render` must refuse and `render_async` is required
    /// (spec.md §2 "Render entry points").
    pub fn requires_async(&self) -> bool {
        match self {
            Op::FilterAsync { .. } => true,
            Op::For { mode, body, .. } => {
                !matches!(mode, ForMode::Sync) || body.requires_async()
            }
            Op::CallExtension { is_async, .. } => *is_async,
            Op::Text(_) | Op::Literal(_) | Op::Symbol { .. } => false,
            Op::Output { expr, .. } => expr.requires_async(),
            Op::Seq(children) => children.iter().any(Op::requires_async),
            Op::Array(items, _) => items.iter().any(Op::requires_async),
            Op::Dict(pairs, _) => pairs.iter().any(|(_, v)| v.requires_async()),
            Op::BinOp { left, right, .. } => left.requires_async() || right.requires_async(),
            Op::UnaryOp { operand, .. } => operand.requires_async(),
            Op::Compare { expr, ops, .. } => {
                expr.requires_async() || ops.iter().any(|(_, e)| e.requires_async())
            }
            Op::In { left, right, .. } => left.requires_async() || right.requires_async(),
            Op::Is { left, args, .. } => left.requires_async() || args.iter().any(Op::requires_async),
            Op::LookupVal { target, value, .. } => target.requires_async() || value.requires_async(),
            Op::FunCall { callee, args, .. } => {
                callee.requires_async() || args.iter().any(Op::requires_async)
            }
            Op::Filter { args, .. } => args.iter().any(Op::requires_async),
            Op::KeywordArgs(pairs, _) => pairs.iter().any(|(_, v)| v.requires_async()),
            Op::If { cond, body, else_, .. } => {
                cond.requires_async()
                    || body.requires_async()
                    || else_.as_ref().is_some_and(|e| e.requires_async())
            }
            Op::InlineIf { cond, body, else_, .. } => {
                cond.requires_async()
                    || body.requires_async()
                    || else_.as_ref().is_some_and(|e| e.requires_async())
            }
            Op::Switch { expr, cases, default, .. } => {
                expr.requires_async()
                    || cases.iter().any(|c| c.value.requires_async() || c.body.requires_async())
                    || default.as_ref().is_some_and(|d| d.requires_async())
            }
            Op::Set { value, .. } => value.requires_async(),
            Op::Block { body, .. } => body.requires_async(),
            Op::Super { .. } => false,
            Op::Extends { template, .. } => template.requires_async(),
            Op::Include { template, .. } => template.requires_async(),
            Op::Import { template, .. } => template.requires_async(),
            Op::FromImport { template, .. } => template.requires_async(),
            Op::Macro { body, .. } => body.requires_async(),
            Op::CallBlock { callee, body, .. } => callee.requires_async() || body.requires_async(),
            Op::Capture { body, .. } => body.requires_async(),
            Op::CallExtension { args, content_args, .. } => {
                args.iter().any(Op::requires_async) || content_args.iter().any(|c| c.requires_async())
            }
        }
    }
}
