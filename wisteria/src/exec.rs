//! The tree-walking interpreter: evaluates a compiled [`crate::ir::Op`] tree
//! against a render-time [`Context`]/[`Frame`], per spec.md §4.5's emission
//! rules restated as evaluation rules (see `crate::ir`'s module doc).
//!
//! One recursive `eval`, grounded on `subset_julia_vm::vm::interp`'s
//! single-function-per-node-kind tree walker, generalized from a plain
//! recursive fn to an `async fn` (via `async-recursion`, since `Context`/
//! `Frame` are `Rc`/`RefCell`-based and therefore `?Send`) so that
//! `FilterAsync`/`ForMode::AsyncAll`/async `CallExtension` suspension points
//! can actually suspend.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use async_recursion::async_recursion;
use indexmap::IndexMap;
use wisteria_parser::ast::{BinOp, CompareOpKind, ForMode, ForTarget, UnaryOp};
use wisteria_parser::Span;
use wisteria_runtime::prelude::*;

use crate::context::Context;
use crate::environment::{Environment, EnvironmentError};
use crate::error::{runtime_err, RenderError, RenderResult};
use crate::frame::Frame;
use crate::ir::Op;
use crate::loader::LoaderError;
use crate::template::Template;
use crate::value::{MacroValue, Value};

/// Renders a template's `root`, following the `extends` chain (spec.md §4.5
/// "Root"): once `root` has executed, if it resolved an `Extends` (leaving
/// `context.parent_template` set), the accumulated output is discarded and
/// the parent is rendered instead, with a fresh top-level frame but the same
/// context — so child block overrides, already registered, still win.
pub async fn render_root(
    env: &Environment,
    template: &Template,
    context: Rc<RefCell<Context>>,
    mut frame: Frame<Value>,
) -> RenderResult<String> {
    let mut buf = String::new();
    eval(env, &context, &mut frame, &mut buf, template.throw_on_undefined, None, &template.root).await?;
    loop {
        let parent = context.borrow_mut().parent_template.take();
        let Some(parent) = parent else { break };
        buf = String::new();
        frame = Frame::new();
        eval(env, &context, &mut frame, &mut buf, parent.throw_on_undefined, None, &parent.root).await?;
    }
    Ok(buf)
}

/// Evaluates one `Op`. Expression-shaped variants (`Literal`, `BinOp`,
/// `InlineIf`, `Super`, `Capture`, ...) return the `Value` they compute
/// without touching `buf`; statement-shaped variants (`Text`, `Output`,
/// `If`, `For`, `Block`, ...) append to `buf` and return `Value::Undefined`.
/// `current_block` identifies the block body presently executing, if any —
/// the identity `Op::Super` walks one step up from via `Context::get_super`.
#[async_recursion(?Send)]
pub(crate) async fn eval(
    env: &Environment,
    context: &Rc<RefCell<Context>>,
    frame: &mut Frame<Value>,
    buf: &mut String,
    throw_on_undefined: bool,
    current_block: Option<Rc<Op>>,
    op: &Op,
) -> RenderResult<Value> {
    match op {
        Op::Text(text) => {
            buf.push_str(text);
            Ok(Value::Undefined)
        }
        Op::Output { expr, span } => {
            let value = eval(env, context, frame, buf, throw_on_undefined, current_block, expr).await?;
            if throw_on_undefined {
                ensure_defined(&value).map_err(|e| runtime_err(e, *span))?;
            }
            buf.push_str(&suppress_value(&value, env.opts.autoescape));
            Ok(Value::Undefined)
        }
        Op::Seq(children) => {
            for child in children {
                eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), child).await?;
            }
            Ok(Value::Undefined)
        }

        Op::Literal(v) => Ok(v.clone()),
        Op::Symbol { name, .. } => {
            if let Some(v) = frame.lookup(name) {
                return Ok(v.clone());
            }
            if let Some(v) = context.borrow().lookup(name) {
                return Ok(v);
            }
            if let Some(v) = env.globals().get(name) {
                return Ok(v.clone());
            }
            Ok(Value::Undefined)
        }

        Op::Array(items, _) => {
            let values = eval_each(env, context, frame, buf, throw_on_undefined, current_block, items).await?;
            Ok(Value::Array(values))
        }
        Op::Dict(pairs, _) => {
            let mut map = IndexMap::with_capacity(pairs.len());
            for (k, v) in pairs {
                let value = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), v).await?;
                map.insert(k.clone(), value);
            }
            Ok(Value::Map(map))
        }

        Op::BinOp { op: bop, left, right, span } => match bop {
            BinOp::Or => {
                let l = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), left).await?;
                if l.truthy() {
                    Ok(l)
                } else {
                    eval(env, context, frame, buf, throw_on_undefined, current_block, right).await
                }
            }
            BinOp::And => {
                let l = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), left).await?;
                if !l.truthy() {
                    Ok(l)
                } else {
                    eval(env, context, frame, buf, throw_on_undefined, current_block, right).await
                }
            }
            _ => {
                let l = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), left).await?;
                let r = eval(env, context, frame, buf, throw_on_undefined, current_block, right).await?;
                arith(*bop, l, r, *span)
            }
        },
        Op::UnaryOp { op: uop, operand, span } => {
            let v = eval(env, context, frame, buf, throw_on_undefined, current_block, operand).await?;
            match uop {
                UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                UnaryOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(type_error(format!("bad operand type for unary -: {}", other.type_name()), *span)),
                },
                UnaryOp::Pos => match v {
                    Value::Int(i) => Ok(Value::Int(i)),
                    Value::Float(f) => Ok(Value::Float(f)),
                    other => Err(type_error(format!("bad operand type for unary +: {}", other.type_name()), *span)),
                },
            }
        }
        Op::Compare { expr, ops, .. } => {
            let mut current = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), expr).await?;
            let mut result = true;
            for (kind, rhs_op) in ops {
                let rhs = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), rhs_op).await?;
                let ok = match kind {
                    CompareOpKind::Eq => current.loose_eq(&rhs),
                    CompareOpKind::NotEq => !current.loose_eq(&rhs),
                    CompareOpKind::Lt => current.partial_cmp_loose(&rhs) == Some(std::cmp::Ordering::Less),
                    CompareOpKind::Gt => current.partial_cmp_loose(&rhs) == Some(std::cmp::Ordering::Greater),
                    CompareOpKind::Le => matches!(
                        current.partial_cmp_loose(&rhs),
                        Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
                    ),
                    CompareOpKind::Ge => matches!(
                        current.partial_cmp_loose(&rhs),
                        Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
                    ),
                };
                if !ok {
                    result = false;
                    break;
                }
                current = rhs;
            }
            Ok(Value::Bool(result))
        }
        Op::In { negated, left, right, .. } => {
            let l = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), left).await?;
            let r = eval(env, context, frame, buf, throw_on_undefined, current_block, right).await?;
            Ok(Value::Bool(in_operator(&l, &r) != *negated))
        }
        Op::Is { negated, left, name, args, span } => {
            let left_val = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), left).await?;
            let arg_vals = eval_each(env, context, frame, buf, throw_on_undefined, current_block, args).await?;
            let test = env
                .get_test(name)
                .ok_or_else(|| RenderError::UnknownTest { name: name.clone(), span: *span })?;
            let result = test.call(&context.borrow(), &left_val, &arg_vals)?;
            Ok(Value::Bool(result != *negated))
        }

        Op::LookupVal { target, value, span } => {
            let target_val = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), target).await?;
            let value_val = eval(env, context, frame, buf, throw_on_undefined, current_block, value).await?;
            if let Some(key) = value_val.as_str() {
                if let Some(v) = member_lookup(&target_val, key) {
                    return Ok(v);
                }
            }
            target_val.get_index(&value_val).map_err(|e| runtime_err(e, *span))
        }
        Op::FunCall { callee, args, span } => {
            let callee_val = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), callee).await?;
            let arg_vals = eval_each(env, context, frame, buf, throw_on_undefined, current_block, args).await?;
            call_value(env, context, &callee_val, &arg_vals, *span).await
        }
        Op::Filter { name, args, span } => {
            let values = eval_each(env, context, frame, buf, throw_on_undefined, current_block, args).await?;
            let filter = env
                .get_filter(name)
                .ok_or_else(|| RenderError::UnknownFilter { name: name.clone(), span: *span })?;
            filter.call(&context.borrow(), &values)
        }
        Op::FilterAsync { name, args, .. } => {
            let span = op.span();
            let values = eval_each(env, context, frame, buf, throw_on_undefined, current_block, args).await?;
            let filter = env
                .get_async_filter(name)
                .ok_or_else(|| RenderError::UnknownFilter { name: name.clone(), span })?;
            let ctx_ref = context.borrow();
            let result = filter.call(&ctx_ref, &values).await;
            drop(ctx_ref);
            result
        }
        Op::KeywordArgs(pairs, _) => {
            let mut map = IndexMap::with_capacity(pairs.len());
            for (k, v) in pairs {
                let value = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), v).await?;
                map.insert(k.clone(), value);
            }
            Ok(Value::KeywordArgs(map))
        }

        Op::If { cond, body, else_, .. } => {
            let c = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), cond).await?;
            if c.truthy() {
                eval(env, context, frame, buf, throw_on_undefined, current_block, body).await
            } else if let Some(e) = else_ {
                eval(env, context, frame, buf, throw_on_undefined, current_block, e).await
            } else {
                Ok(Value::Undefined)
            }
        }
        Op::InlineIf { cond, body, else_, .. } => {
            let c = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), cond).await?;
            if c.truthy() {
                eval(env, context, frame, buf, throw_on_undefined, current_block, body).await
            } else if let Some(e) = else_ {
                eval(env, context, frame, buf, throw_on_undefined, current_block, e).await
            } else {
                Ok(Value::Undefined)
            }
        }
        Op::Switch { expr, cases, default, .. } => {
            let scrutinee = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), expr).await?;
            let mut matched = false;
            for case in cases {
                if !matched {
                    let case_val =
                        eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), &case.value).await?;
                    if !scrutinee.loose_eq(&case_val) {
                        continue;
                    }
                    matched = true;
                }
                let falls_through = matches!(&case.body, Op::Seq(v) if v.is_empty());
                eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), &case.body).await?;
                if !falls_through {
                    return Ok(Value::Undefined);
                }
            }
            if !matched {
                if let Some(d) = default {
                    eval(env, context, frame, buf, throw_on_undefined, current_block, d).await?;
                }
            }
            Ok(Value::Undefined)
        }
        Op::For { mode, arr, target, body, else_, span } => {
            let arr_val = eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), arr).await?;
            let bindings = bind_iter_items(target, &arr_val, *span)?;
            if bindings.is_empty() {
                if let Some(e) = else_ {
                    eval(env, context, frame, buf, throw_on_undefined, current_block, e).await?;
                }
                return Ok(Value::Undefined);
            }
            let len = bindings.len();
            match mode {
                ForMode::AsyncAll => {
                    let base_frame = frame.clone();
                    let indexed: Vec<(usize, Vec<(String, Value)>)> = bindings.into_iter().enumerate().collect();
                    let results: Vec<String> = async_all(indexed, |i, binds| {
                        let context = context.clone();
                        let current_block = current_block.clone();
                        let body = body.clone();
                        let base_frame = base_frame.clone();
                        async move {
                            let mut child = base_frame.push(false);
                            for (n, v) in binds {
                                child.declare(&n, v);
                            }
                            child.declare("loop", loop_value(i, len));
                            let mut local_buf = String::new();
                            eval(env, &context, &mut child, &mut local_buf, throw_on_undefined, current_block, body.as_ref())
                                .await?;
                            Ok::<String, RenderError>(local_buf)
                        }
                    })
                    .await?;
                    for s in results {
                        buf.push_str(&s);
                    }
                }
                ForMode::Sync | ForMode::AsyncEach => {
                    // Driven as a plain sequential loop rather than through
                    // `async_each`'s `FnMut` closure: the body needs `&mut
                    // child`/`&mut buf` live across each `.await`, and a
                    // closure capturing those non-`Copy` `&mut` borrows would
                    // have to move them out on every call, making it `FnOnce`
                    // rather than the `FnMut` `async_each` requires. `eval`
                    // is already `#[async_recursion]`, so there's no need for
                    // a helper here — asyncEach's "strictly in sequence"
                    // ordering guarantee (spec.md §5) falls out of awaiting
                    // each iteration in turn.
                    for (i, binds) in bindings.into_iter().enumerate() {
                        let mut child = frame.push(false);
                        for (n, v) in binds {
                            child.declare(&n, v);
                        }
                        child.declare("loop", loop_value(i, len));
                        eval(env, context, &mut child, buf, throw_on_undefined, current_block.clone(), body.as_ref())
                            .await?;
                    }
                }
            }
            Ok(Value::Undefined)
        }
        Op::Set { targets, value, .. } => {
            let val = eval(env, context, frame, buf, throw_on_undefined, current_block, value).await?;
            if targets.len() == 1 {
                frame.set(&targets[0], val.clone(), true);
                if frame.is_top_level() && !targets[0].starts_with('_') {
                    context.borrow_mut().add_export(&targets[0], Some(val));
                }
            } else {
                let parts: Vec<Value> = val.as_array().map(|s| s.to_vec()).unwrap_or_default();
                for (i, name) in targets.iter().enumerate() {
                    let v = parts.get(i).cloned().unwrap_or(Value::Undefined);
                    frame.set(name, v.clone(), true);
                    if frame.is_top_level() && !name.starts_with('_') {
                        context.borrow_mut().add_export(name, Some(v));
                    }
                }
            }
            Ok(Value::Undefined)
        }

        Op::Block { name, body, .. } => {
            let resolved = context.borrow().get_block(name).unwrap_or_else(|| body.clone());
            eval(env, context, frame, buf, throw_on_undefined, Some(resolved.clone()), resolved.as_ref()).await?;
            Ok(Value::Undefined)
        }
        Op::Super { block_name, span } => {
            let current = current_block
                .ok_or_else(|| RenderError::UnknownBlock { name: block_name.clone(), span: *span })?;
            let parent_body = context
                .borrow()
                .get_super(block_name, &current)
                .ok_or_else(|| RenderError::UnknownBlock { name: block_name.clone(), span: *span })?;
            let mut super_buf = String::new();
            eval(
                env,
                context,
                frame,
                &mut super_buf,
                throw_on_undefined,
                Some(parent_body.clone()),
                parent_body.as_ref(),
            )
            .await?;
            Ok(Value::Safe(super_buf))
        }
        Op::Extends { template: template_expr, span } => {
            let name_val =
                eval(env, context, frame, buf, throw_on_undefined, current_block, template_expr).await?;
            let name = name_val
                .as_str()
                .ok_or_else(|| type_error("'extends' target must be a string template name".into(), *span))?
                .to_string();
            let parent = env.get_template_async(&name).await.map_err(|e| env_err_to_render(e, *span))?;
            parent.seed_context(&mut context.borrow_mut());
            context.borrow_mut().parent_template = Some(parent);
            Ok(Value::Undefined)
        }
        Op::Include { template: template_expr, ignore_missing, span } => {
            let name_val =
                eval(env, context, frame, buf, throw_on_undefined, current_block, template_expr).await?;
            let name = name_val
                .as_str()
                .ok_or_else(|| type_error("'include' target must be a string template name".into(), *span))?
                .to_string();
            match env.get_template_async(&name).await {
                Ok(tmpl) => {
                    let vars = context.borrow().get_variables().clone();
                    let rendered = tmpl.render_async(env, vars).await?;
                    buf.push_str(&rendered);
                }
                Err(EnvironmentError::Loader(LoaderError::NotFound(_))) if *ignore_missing => {}
                Err(e) => return Err(env_err_to_render(e, *span)),
            }
            Ok(Value::Undefined)
        }
        Op::Import { template: template_expr, target, with_context, span } => {
            let name_val =
                eval(env, context, frame, buf, throw_on_undefined, current_block, template_expr).await?;
            let name = name_val
                .as_str()
                .ok_or_else(|| type_error("'import' target must be a string template name".into(), *span))?
                .to_string();
            let tmpl = env.get_template_async(&name).await.map_err(|e| env_err_to_render(e, *span))?;
            let vars = if *with_context { context.borrow().get_variables().clone() } else { IndexMap::new() };
            let exported = tmpl.get_exported(env, vars).await?;
            frame.declare(target, Value::Map(exported));
            Ok(Value::Undefined)
        }
        Op::FromImport { template: template_expr, names, with_context, span } => {
            let name_val =
                eval(env, context, frame, buf, throw_on_undefined, current_block, template_expr).await?;
            let name = name_val
                .as_str()
                .ok_or_else(|| type_error("'from ... import' target must be a string template name".into(), *span))?
                .to_string();
            let tmpl = env.get_template_async(&name).await.map_err(|e| env_err_to_render(e, *span))?;
            let vars = if *with_context { context.borrow().get_variables().clone() } else { IndexMap::new() };
            let exported = tmpl.get_exported(env, vars).await?;
            for n in names {
                let v = exported.get(&n.name).cloned().ok_or_else(|| RenderError::MissingImport {
                    name: n.name.clone(),
                    template: name.clone(),
                    span: *span,
                })?;
                let bind_name = n.alias.clone().unwrap_or_else(|| n.name.clone());
                frame.declare(&bind_name, v);
            }
            Ok(Value::Undefined)
        }
        Op::Macro { name, args, body, .. } => {
            let mv = MacroValue {
                name: name.clone(),
                arg_names: args.iter().map(|a| a.name.clone()).collect(),
                defaults: args.iter().map(|a| a.default.clone()).collect(),
                body: body.clone(),
                closure_frame: frame.clone(),
            };
            frame.declare(name, Value::Macro(Rc::new(mv)));
            Ok(Value::Undefined)
        }
        Op::CallBlock { call_args, callee, body, span } => {
            let caller_mv = MacroValue {
                name: "caller".to_string(),
                arg_names: call_args.iter().map(|a| a.name.clone()).collect(),
                defaults: call_args.iter().map(|a| a.default.clone()).collect(),
                body: body.clone(),
                closure_frame: frame.clone(),
            };
            let caller_value = Value::Macro(Rc::new(caller_mv));
            let result = match callee.as_ref() {
                Op::FunCall { callee: inner, args, span: call_span } => {
                    let callee_val =
                        eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), inner.as_ref())
                            .await?;
                    let mut arg_vals =
                        eval_each(env, context, frame, buf, throw_on_undefined, current_block, args).await?;
                    match arg_vals.last_mut() {
                        Some(Value::KeywordArgs(map)) => {
                            map.insert("caller".to_string(), caller_value);
                        }
                        _ => {
                            let mut kwargs = IndexMap::new();
                            kwargs.insert("caller".to_string(), caller_value);
                            arg_vals.push(Value::KeywordArgs(kwargs));
                        }
                    }
                    call_value(env, context, &callee_val, &arg_vals, *call_span).await?
                }
                other => {
                    let callee_val =
                        eval(env, context, frame, buf, throw_on_undefined, current_block, other).await?;
                    call_value(env, context, &callee_val, std::slice::from_ref(&caller_value), *span).await?
                }
            };
            buf.push_str(&suppress_value(&result, env.opts.autoescape));
            Ok(Value::Undefined)
        }
        Op::Capture { body, .. } => {
            let mut captured = String::new();
            eval(env, context, frame, &mut captured, throw_on_undefined, current_block, body).await?;
            Ok(Value::Safe(captured))
        }
        Op::CallExtension { ext_name, prop, args, content_args, autoescape, is_async, span } => {
            let arg_vals = eval_each(env, context, frame, buf, throw_on_undefined, current_block.clone(), args).await?;
            let mut content_strings = Vec::with_capacity(content_args.len());
            for content in content_args {
                let mut rendered = String::new();
                eval(env, context, frame, &mut rendered, throw_on_undefined, current_block.clone(), content.as_ref())
                    .await?;
                content_strings.push(rendered);
            }
            let value = if *is_async {
                let ext = env
                    .get_async_extension(ext_name)
                    .ok_or_else(|| RenderError::UnknownExtension { name: ext_name.clone(), span: *span })?;
                let ctx_ref = context.borrow();
                let result = ext.call(&ctx_ref, prop, &arg_vals, &content_strings, *autoescape).await;
                drop(ctx_ref);
                result?
            } else {
                let ext = env
                    .get_extension(ext_name)
                    .ok_or_else(|| RenderError::UnknownExtension { name: ext_name.clone(), span: *span })?;
                ext.call(&context.borrow(), prop, &arg_vals, &content_strings, *autoescape)?
            };
            buf.push_str(&suppress_value(&value, *autoescape));
            Ok(Value::Undefined)
        }
    }
}

async fn eval_each(
    env: &Environment,
    context: &Rc<RefCell<Context>>,
    frame: &mut Frame<Value>,
    buf: &mut String,
    throw_on_undefined: bool,
    current_block: Option<Rc<Op>>,
    ops: &[Op],
) -> RenderResult<Vec<Value>> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        out.push(eval(env, context, frame, buf, throw_on_undefined, current_block.clone(), op).await?);
    }
    Ok(out)
}

async fn call_value(
    env: &Environment,
    context: &Rc<RefCell<Context>>,
    callee: &Value,
    args: &[Value],
    span: Span,
) -> RenderResult<Value> {
    match callee {
        Value::Macro(mv) => {
            let (positional, kwargs) = Value::split_trailing_kwargs(args);
            call_macro(env, context, mv, positional, kwargs).await
        }
        Value::Native(nv) => (nv.func)(args),
        other => Err(RenderError::NotCallable { type_name: other.type_name().to_string(), span }),
    }
}

/// Invokes a `{% macro %}`/`{% call %}` body: positional args bind first,
/// then keyword args by name, then per-argument defaults (evaluated in the
/// macro's own closure frame, which may itself reference earlier defaults
/// once bound); the call runs in an isolated frame pushed off the closure,
/// per spec.md §4.4 ("macro bodies must not see the call site's locals").
async fn call_macro(
    env: &Environment,
    context: &Rc<RefCell<Context>>,
    mv: &MacroValue,
    positional: &[Value],
    kwargs: Option<&IndexMap<String, Value>>,
) -> RenderResult<Value> {
    let mut call_frame = mv.closure_frame.push(true);
    for (i, name) in mv.arg_names.iter().enumerate() {
        let value = if let Some(v) = positional.get(i) {
            v.clone()
        } else if let Some(v) = kwargs.and_then(|k| k.get(name)) {
            v.clone()
        } else if let Some(default_op) = &mv.defaults[i] {
            let mut scratch = String::new();
            eval(env, context, &mut call_frame, &mut scratch, false, None, default_op.as_ref()).await?
        } else {
            Value::Undefined
        };
        call_frame.declare(name, value);
    }
    if !mv.arg_names.iter().any(|n| n == "caller") {
        if let Some(caller) = kwargs.and_then(|k| k.get("caller")) {
            call_frame.declare("caller", caller.clone());
        }
    }
    let mut body_buf = String::new();
    eval(env, context, &mut call_frame, &mut body_buf, false, None, mv.body.as_ref()).await?;
    Ok(Value::Safe(body_buf))
}

/// Builds one binding set (names to values) per iteration, branching on the
/// `{% for %}` target shape (spec.md §3 `ForTarget`) and the iterated
/// value's own shape — `for k, v in map` reads map entries directly rather
/// than going through `iter_values` (which yields only keys for a `Single`
/// target over a map).
fn bind_iter_items(target: &ForTarget, value: &Value, span: Span) -> RenderResult<Vec<Vec<(String, Value)>>> {
    match target {
        ForTarget::KeyValue(k, v) => match value {
            Value::Map(m) | Value::KeywordArgs(m) => Ok(m
                .iter()
                .map(|(key, val)| vec![(k.clone(), Value::str(key.clone())), (v.clone(), val.clone())])
                .collect()),
            other => Err(type_error(format!("cannot iterate {} as key, value pairs", other.type_name()), span)),
        },
        ForTarget::Tuple(names) => {
            let items = value.iter_values().map_err(|e| runtime_err(e, span))?;
            items
                .into_iter()
                .map(|item| {
                    let arr = item
                        .as_array()
                        .ok_or_else(|| type_error("cannot destructure a non-array loop item".into(), span))?;
                    Ok(names
                        .iter()
                        .enumerate()
                        .map(|(i, n)| (n.clone(), arr.get(i).cloned().unwrap_or(Value::Undefined)))
                        .collect())
                })
                .collect()
        }
        ForTarget::Single(name) => {
            let items = value.iter_values().map_err(|e| runtime_err(e, span))?;
            Ok(items.into_iter().map(|item| vec![(name.clone(), item)]).collect())
        }
    }
}

/// The `loop` object bound inside every `{% for %}` iteration (GLOSSARY
/// "LoopVars"): 1-based/0-based position from both ends, plus `first`/
/// `last`/`length`.
fn loop_value(i: usize, len: usize) -> Value {
    let mut m = IndexMap::with_capacity(7);
    m.insert("index".to_string(), Value::Int(i as i64 + 1));
    m.insert("index0".to_string(), Value::Int(i as i64));
    m.insert("revindex".to_string(), Value::Int((len - i) as i64));
    m.insert("revindex0".to_string(), Value::Int((len - i - 1) as i64));
    m.insert("first".to_string(), Value::Bool(i == 0));
    m.insert("last".to_string(), Value::Bool(i + 1 == len));
    m.insert("length".to_string(), Value::Int(len as i64));
    Value::Map(m)
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

fn is_int(v: &Value) -> bool {
    matches!(v, Value::Int(_))
}

fn floor_div_i64(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Arithmetic with Int-preserving semantics where both operands are Int,
/// falling back to Float otherwise — a deliberate departure from a pure
/// JS-style all-Float numeric tower (documented in DESIGN.md), made so
/// `{{ 1 + 1 }}` renders `2` rather than `2.0`. `+` additionally accepts one
/// or both operands being a string, performing concatenation instead.
fn arith(op: BinOp, l: Value, r: Value, span: Span) -> RenderResult<Value> {
    match op {
        BinOp::Concat => Ok(Value::str(format!("{}{}", l.render(), r.render()))),
        BinOp::Add => {
            if is_numeric(&l) && is_numeric(&r) {
                numeric_arith(BinOp::Add, l, r, span)
            } else if matches!(l, Value::Str(_) | Value::Safe(_)) || matches!(r, Value::Str(_) | Value::Safe(_)) {
                Ok(Value::str(format!("{}{}", l.render(), r.render())))
            } else {
                Err(type_error(
                    format!("unsupported operand types for +: {} and {}", l.type_name(), r.type_name()),
                    span,
                ))
            }
        }
        BinOp::Sub | BinOp::Mul | BinOp::Mod | BinOp::FloorDiv | BinOp::Pow => numeric_arith(op, l, r, span),
        BinOp::Div => {
            if !is_numeric(&l) || !is_numeric(&r) {
                return Err(type_error(
                    format!("unsupported operand types for /: {} and {}", l.type_name(), r.type_name()),
                    span,
                ));
            }
            let b = r.as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(div_by_zero(span));
            }
            let result = l.as_f64().unwrap_or(0.0) / b;
            if is_int(&l) && is_int(&r) && result.fract() == 0.0 {
                Ok(Value::Int(result as i64))
            } else {
                Ok(Value::Float(result))
            }
        }
        BinOp::Or | BinOp::And => unreachable!("Or/And short-circuit before reaching arith"),
    }
}

fn numeric_arith(op: BinOp, l: Value, r: Value, span: Span) -> RenderResult<Value> {
    if !is_numeric(&l) || !is_numeric(&r) {
        return Err(type_error(
            format!("unsupported operand types for {:?}: {} and {}", op, l.type_name(), r.type_name()),
            span,
        ));
    }
    let both_int = is_int(&l) && is_int(&r);
    let (af, bf) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
    match (op, both_int) {
        (BinOp::Add, true) => Ok(Value::Int(l.as_i64().unwrap() + r.as_i64().unwrap())),
        (BinOp::Add, false) => Ok(Value::Float(af + bf)),
        (BinOp::Sub, true) => Ok(Value::Int(l.as_i64().unwrap() - r.as_i64().unwrap())),
        (BinOp::Sub, false) => Ok(Value::Float(af - bf)),
        (BinOp::Mul, true) => Ok(Value::Int(l.as_i64().unwrap() * r.as_i64().unwrap())),
        (BinOp::Mul, false) => Ok(Value::Float(af * bf)),
        (BinOp::Mod, true) => {
            let b = r.as_i64().unwrap();
            if b == 0 {
                return Err(div_by_zero(span));
            }
            Ok(Value::Int(l.as_i64().unwrap() % b))
        }
        (BinOp::Mod, false) => {
            if bf == 0.0 {
                return Err(div_by_zero(span));
            }
            Ok(Value::Float(af % bf))
        }
        (BinOp::FloorDiv, true) => {
            let b = r.as_i64().unwrap();
            if b == 0 {
                return Err(div_by_zero(span));
            }
            Ok(Value::Int(floor_div_i64(l.as_i64().unwrap(), b)))
        }
        (BinOp::FloorDiv, false) => {
            if bf == 0.0 {
                return Err(div_by_zero(span));
            }
            Ok(Value::Float((af / bf).floor()))
        }
        (BinOp::Pow, true) => {
            let base = l.as_i64().unwrap();
            let exp = r.as_i64().unwrap();
            if (0..=u32::MAX as i64).contains(&exp) {
                if let Some(v) = base.checked_pow(exp as u32) {
                    return Ok(Value::Int(v));
                }
            }
            Ok(Value::Float((base as f64).powf(exp as f64)))
        }
        (BinOp::Pow, false) => Ok(Value::Float(af.powf(bf))),
        _ => unreachable!("numeric_arith only handles Add/Sub/Mul/Mod/FloorDiv/Pow"),
    }
}

fn type_error(message: String, span: Span) -> RenderError {
    RenderError::TypeError { message, span }
}

fn div_by_zero(span: Span) -> RenderError {
    RenderError::TypeError { message: "division by zero".to_string(), span }
}

/// Wraps a template/loader/compile failure surfaced while resolving
/// `extends`/`include`/`import` as a spanned [`RenderError`] — `NotFound`
/// becomes `TemplateNotFound` (spec.md §7's dedicated kind), everything else
/// is wrapped generically.
fn env_err_to_render(e: EnvironmentError, span: Span) -> RenderError {
    match &e {
        EnvironmentError::Loader(LoaderError::NotFound(name)) => RenderError::TemplateNotFound { name: name.clone() },
        _ => RenderError::Wrapped { source: Arc::new(e), span },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::loader::MapLoader;

    fn render(env: &Environment, src: &str, vars: IndexMap<String, Value>) -> String {
        let tmpl = env.compile(src, "t").expect("compile");
        tmpl.render(env, vars).expect("render")
    }

    #[test]
    fn autoescapes_output_by_default() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let mut vars = IndexMap::new();
        vars.insert("x".to_string(), Value::str("<b>"));
        assert_eq!(render(&env, "{{ x }}", vars), "&lt;b&gt;");
    }

    #[test]
    fn safe_filter_suppresses_escaping() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let mut vars = IndexMap::new();
        vars.insert("x".to_string(), Value::str("<b>"));
        assert_eq!(render(&env, "{{ x | safe }}", vars), "<b>");
    }

    #[test]
    fn if_else_branches() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let mut vars = IndexMap::new();
        vars.insert("flag".to_string(), Value::Bool(false));
        let out = render(&env, "{% if flag %}yes{% else %}no{% endif %}", vars);
        assert_eq!(out, "no");
    }

    #[test]
    fn for_loop_uses_index_and_falls_back_to_else_when_empty() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let mut vars = IndexMap::new();
        vars.insert("items".to_string(), Value::Array(vec![Value::str("a"), Value::str("b")]));
        let out = render(&env, "{% for x in items %}{{ loop.index }}:{{ x }} {% else %}empty{% endfor %}", vars);
        assert_eq!(out, "1:a 2:b ");

        let mut empty_vars = IndexMap::new();
        empty_vars.insert("items".to_string(), Value::Array(vec![]));
        let out = render(&env, "{% for x in items %}{{ x }}{% else %}empty{% endfor %}", empty_vars);
        assert_eq!(out, "empty");
    }

    #[test]
    fn int_preserving_arithmetic() {
        let env = Environment::new(Box::new(MapLoader::new()));
        assert_eq!(render(&env, "{{ 1 + 1 }}", IndexMap::new()), "2");
        assert_eq!(render(&env, "{{ 7 // 2 }}", IndexMap::new()), "3");
        assert_eq!(render(&env, "{{ 1 / 2 }}", IndexMap::new()), "0.5");
    }

    #[test]
    fn mod_uses_native_truncated_semantics_not_floor_division() {
        let env = Environment::new(Box::new(MapLoader::new()));
        // Sign follows the dividend (native `%`), not the divisor (floor mod).
        assert_eq!(render(&env, "{{ -1 % 3 }}", IndexMap::new()), "-1");
        assert_eq!(render(&env, "{{ -5.0 % 3.0 }}", IndexMap::new()), "-2");
        // `//` (FloorDiv) keeps its explicit spec carve-out, unaffected.
        assert_eq!(render(&env, "{{ -7 // 2 }}", IndexMap::new()), "-4");
    }

    #[test]
    fn macro_binds_positional_keyword_and_default_args() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let src = "{% macro greet(name, greeting=\"Hi\") %}{{ greeting }}, {{ name }}!{% endmacro %}\
                   {{ greet(\"Ann\") }} {{ greet(\"Bo\", greeting=\"Yo\") }}";
        assert_eq!(render(&env, src, IndexMap::new()), "Hi, Ann! Yo, Bo!");
    }

    #[test]
    fn extends_with_super_concatenates_parent_and_child_block_content() {
        let loader = MapLoader::new().with(
            "base.html",
            "{% block content %}base{% endblock %}",
        );
        let env = Environment::new(Box::new(loader));
        let src = "{% extends \"base.html\" %}{% block content %}{{ super() }}+child{% endblock %}";
        assert_eq!(render(&env, src, IndexMap::new()), "base+child");
    }

    #[test]
    fn switch_falls_through_empty_cases() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let mut vars = IndexMap::new();
        vars.insert("x".to_string(), Value::Int(1));
        let src = "{% switch x %}{% case 1 %}{% case 2 %}two{% default %}other{% endswitch %}";
        assert_eq!(render(&env, src, vars), "two");
    }

    #[test]
    fn include_renders_child_template_with_current_vars() {
        let loader = MapLoader::new().with("greeting.txt", "Hi {{ name }}");
        let env = Environment::new(Box::new(loader));
        let mut vars = IndexMap::new();
        vars.insert("name".to_string(), Value::str("Ann"));
        assert_eq!(render(&env, "{% include \"greeting.txt\" %}!", vars), "Hi Ann!");
    }

    /// No template syntax produces `ForMode::AsyncAll` (only a host
    /// extension hand-building IR would), so it is exercised here directly:
    /// also a regression test for the `base_frame` closure capture in the
    /// `Op::For` `AsyncAll` arm, which must re-clone `base_frame` per
    /// iteration rather than move it, or this wouldn't compile.
    #[test]
    fn async_all_reassembles_output_in_input_order() {
        let env = Environment::new(Box::new(MapLoader::new()));
        let context = Rc::new(RefCell::new(Context::new(IndexMap::new())));
        let mut frame = Frame::new();
        let body = Rc::new(Op::Output {
            expr: Box::new(Op::Symbol { name: "x".to_string(), span: Span::empty() }),
            span: Span::empty(),
        });
        let op = Op::For {
            mode: ForMode::AsyncAll,
            arr: Box::new(Op::Array(
                vec![Op::Literal(Value::str("a")), Op::Literal(Value::str("b")), Op::Literal(Value::str("c"))],
                Span::empty(),
            )),
            target: ForTarget::Single("x".to_string()),
            body,
            else_: None,
            span: Span::empty(),
        };
        let mut buf = String::new();
        futures::executor::block_on(eval(&env, &context, &mut frame, &mut buf, false, None, &op)).unwrap();
        assert_eq!(buf, "abc");
    }
}
