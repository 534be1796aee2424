//! Lowers a transformed AST into the [`crate::ir::Op`] tree the interpreter
//! executes — the Rust restatement of spec.md §4.5's "walks the transformed
//! AST and emits IR text" (here: emits IR *values*, not text).
//!
//! One file, rather than the `context.rs`/`stmt.rs`/`expr.rs` split a
//! text-emitting codegen needs to separate indentation/buffer bookkeeping
//! from node shape: a tree-walking interpreter doesn't emit source, so
//! there's no buffer-naming or temp-id state to keep apart from the
//! recursion itself. `CompilerState` still carries the span-checked
//! invariants spec.md §3 assigns to "Compiler state": discovered block
//! names (duplicate detection) and the extends-arity check.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use wisteria_parser::ast::{self, Literal, Node};
use wisteria_parser::Span;

use crate::error::{CompileError, CompileResult};
use crate::ir::{ImportName, MacroArgSpec, Op, SwitchCase};
use crate::value::Value;

/// Options threaded from `Environment::compile` into the lowering pass.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub throw_on_undefined: bool,
}

/// The result of compiling one template: its root body plus every block it
/// defines, keyed by name (spec.md §6 Template contract: `blocks: map<name,
/// func>`). Nested blocks land in this same flat map — "nested blocks are
/// compiled twice (once inline, once as a named block)" (spec.md §4.2).
pub struct CompiledTemplate {
    pub root: Rc<Op>,
    pub blocks: IndexMap<String, Rc<Op>>,
    pub throw_on_undefined: bool,
}

struct CompilerState {
    seen_blocks: HashSet<String>,
    blocks: IndexMap<String, Rc<Op>>,
    extends_seen: Option<Span>,
    throw_on_undefined: bool,
    /// Name of the `{% block %}` currently being lowered, if any — the
    /// parser has no notion of "which block am I inside" (that's purely a
    /// compiler-side bookkeeping concern), so `{{ super() }}` is recognized
    /// here rather than as a dedicated grammar production: a zero-arg call
    /// to the bare identifier `super` while this is `Some` lowers straight
    /// to `Op::Super` instead of a generic `Op::FunCall`.
    current_block: Option<String>,
}

pub fn compile(ast: Node, opts: &CompileOptions) -> CompileResult<CompiledTemplate> {
    let mut state = CompilerState {
        seen_blocks: HashSet::new(),
        blocks: IndexMap::new(),
        extends_seen: None,
        throw_on_undefined: opts.throw_on_undefined,
        current_block: None,
    };
    let root = lower(&ast, &mut state)?;
    Ok(CompiledTemplate {
        root: Rc::new(root),
        blocks: state.blocks,
        throw_on_undefined: opts.throw_on_undefined,
    })
}

fn lower_lit(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::None => Value::Null,
    }
}

/// Reads the string out of a dict key node, per spec.md §3's invariant
/// "Dict keys are Symbols or string Literals — never general expressions".
fn dict_key(node: &Node) -> CompileResult<String> {
    match node {
        Node::Symbol { name, .. } => Ok(name.clone()),
        Node::Literal { value: Literal::Str(s), .. } => Ok(s.clone()),
        other => Err(CompileError::NonStringDictKey { span: other.span() }),
    }
}

fn lower_box(node: &Node, state: &mut CompilerState) -> CompileResult<Box<Op>> {
    Ok(Box::new(lower(node, state)?))
}

fn lower_opt_box(node: &Option<Box<Node>>, state: &mut CompilerState) -> CompileResult<Option<Box<Op>>> {
    node.as_deref().map(|n| lower_box(n, state)).transpose()
}

fn lower_each(nodes: &[Node], state: &mut CompilerState) -> CompileResult<Vec<Op>> {
    nodes.iter().map(|n| lower(n, state)).collect()
}

fn lower_macro_args(args: &[ast::MacroArg], state: &mut CompilerState) -> CompileResult<Vec<MacroArgSpec>> {
    args.iter()
        .map(|a| -> CompileResult<MacroArgSpec> {
            Ok(MacroArgSpec {
                name: a.name.clone(),
                default: a.default.as_ref().map(|d| lower(d, state)).transpose()?.map(Rc::new),
            })
        })
        .collect()
}

fn lower(node: &Node, state: &mut CompilerState) -> CompileResult<Op> {
    Ok(match node {
        Node::Literal { value, .. } => Op::Literal(lower_lit(value)),
        Node::Symbol { name, span } => Op::Symbol { name: name.clone(), span: *span },
        Node::TemplateData { text, .. } => Op::Text(text.clone()),

        Node::Group { expr, .. } => lower(expr, state)?,
        Node::ArrayNode { items, span } => Op::Array(lower_each(items, state)?, *span),
        Node::Dict { pairs, span } => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = dict_key(k)?;
                out.push((key, lower(v, state)?));
            }
            Op::Dict(out, *span)
        }
        Node::NodeList { children, span } => Op::Seq(lower_seq(children, state, *span)?),

        Node::BinOp { op, left, right, span } => Op::BinOp {
            op: *op,
            left: lower_box(left, state)?,
            right: lower_box(right, state)?,
            span: *span,
        },
        Node::UnaryOp { op, operand, span } => {
            Op::UnaryOp { op: *op, operand: lower_box(operand, state)?, span: *span }
        }
        Node::Compare { expr, ops, span } => {
            let mut lowered_ops = Vec::with_capacity(ops.len());
            for c in ops {
                lowered_ops.push((c.op, lower(&c.expr, state)?));
            }
            Op::Compare { expr: lower_box(expr, state)?, ops: lowered_ops, span: *span }
        }
        Node::In { negated, left, right, span } => Op::In {
            negated: *negated,
            left: lower_box(left, state)?,
            right: lower_box(right, state)?,
            span: *span,
        },
        Node::Is { negated, left, name, args, span } => Op::Is {
            negated: *negated,
            left: lower_box(left, state)?,
            name: name.clone(),
            args: lower_each(args, state)?,
            span: *span,
        },

        Node::LookupVal { target, value, span } => Op::LookupVal {
            target: lower_box(target, state)?,
            value: lower_box(value, state)?,
            span: *span,
        },
        Node::FunCall { callee, args, span } => {
            if args.is_empty() {
                if let Node::Symbol { name, .. } = callee.as_ref() {
                    if name == "super" {
                        let block_name = state.current_block.clone().ok_or(CompileError::SuperOutsideBlock { span: *span })?;
                        return Ok(Op::Super { block_name, span: *span });
                    }
                }
            }
            Op::FunCall { callee: lower_box(callee, state)?, args: lower_each(args, state)?, span: *span }
        }
        Node::Filter { name, args, span } => {
            Op::Filter { name: name.clone(), args: lower_each(args, state)?, span: *span }
        }
        Node::FilterAsync { name, args, symbol, span } => Op::FilterAsync {
            name: name.clone(),
            args: lower_each(args, state)?,
            symbol: symbol.clone(),
            span: *span,
        },
        Node::KeywordArgs { pairs, span } => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                out.push((k.clone(), lower(v, state)?));
            }
            Op::KeywordArgs(out, *span)
        }

        Node::If { cond, body, else_, span } => Op::If {
            cond: lower_box(cond, state)?,
            body: lower_box(body, state)?,
            else_: lower_opt_box(else_, state)?,
            span: *span,
        },
        Node::InlineIf { cond, body, else_, span } => Op::InlineIf {
            cond: lower_box(cond, state)?,
            body: lower_box(body, state)?,
            else_: lower_opt_box(else_, state)?,
            span: *span,
        },
        Node::Switch { expr, cases, default, span } => {
            let mut lowered_cases = Vec::with_capacity(cases.len());
            for c in cases {
                lowered_cases.push(SwitchCase { value: lower(&c.value, state)?, body: lower(&c.body, state)? });
            }
            Op::Switch {
                expr: lower_box(expr, state)?,
                cases: lowered_cases,
                default: lower_opt_box(default, state)?,
                span: *span,
            }
        }
        Node::For { mode, arr, target, body, else_, span } => Op::For {
            mode: *mode,
            arr: lower_box(arr, state)?,
            target: target.clone(),
            body: Rc::new(lower(body, state)?),
            else_: lower_opt_box(else_, state)?,
            span: *span,
        },
        Node::Set { targets, value, span } => {
            Op::Set { targets: targets.clone(), value: lower_box(value, state)?, span: *span }
        }

        Node::Root { children, span } => Op::Seq(lower_seq(children, state, *span)?),
        Node::Output { children, span } => {
            let mut out = Vec::with_capacity(children.len());
            for c in children {
                let expr = lower_box(c, state)?;
                out.push(Op::Output { expr, span: *span });
            }
            Op::Seq(out)
        }
        Node::Block { name, body, span } => {
            if !state.seen_blocks.insert(name.clone()) {
                return Err(CompileError::DuplicateBlock { name: name.clone(), span: *span });
            }
            let outer_block = state.current_block.replace(name.clone());
            let body = lower(body, state);
            state.current_block = outer_block;
            let body = Rc::new(body?);
            state.blocks.insert(name.clone(), body.clone());
            Op::Block { name: name.clone(), body, span: *span }
        }
        Node::Super { block_name, span, .. } => Op::Super { block_name: block_name.clone(), span: *span },
        Node::Extends { template, span } => {
            if let Some(prev) = state.extends_seen {
                let _ = prev;
                return Err(CompileError::MultipleExtends { span: *span });
            }
            state.extends_seen = Some(*span);
            Op::Extends { template: lower_box(template, state)?, span: *span }
        }
        Node::Include { template, ignore_missing, span } => Op::Include {
            template: lower_box(template, state)?,
            ignore_missing: *ignore_missing,
            span: *span,
        },
        Node::Import { template, target, with_context, span } => Op::Import {
            template: lower_box(template, state)?,
            target: target.clone(),
            with_context: *with_context,
            span: *span,
        },
        Node::FromImport { template, names, with_context, span } => Op::FromImport {
            template: lower_box(template, state)?,
            names: names
                .iter()
                .map(|n| ImportName { name: n.name.clone(), alias: n.alias.clone() })
                .collect(),
            with_context: *with_context,
            span: *span,
        },
        Node::Macro { name, args, body, span } => Op::Macro {
            name: name.clone(),
            args: lower_macro_args(args, state)?,
            body: Rc::new(lower(body, state)?),
            span: *span,
        },
        Node::CallBlock { call_args, callee, body, span } => Op::CallBlock {
            call_args: lower_macro_args(call_args, state)?,
            callee: lower_box(callee, state)?,
            body: Rc::new(lower(body, state)?),
            span: *span,
        },
        Node::Capture { body, span } => Op::Capture { body: lower_box(body, state)?, span: *span },
        Node::CallExtension {
            ext_name,
            prop,
            args,
            content_args,
            autoescape,
            is_async,
            span,
        } => Op::CallExtension {
            ext_name: ext_name.clone(),
            prop: prop.clone(),
            args: lower_each(args, state)?,
            content_args: content_args
                .iter()
                .map(|c| lower(c, state).map(Rc::new))
                .collect::<CompileResult<Vec<_>>>()?,
            autoescape: *autoescape,
            is_async: *is_async,
            span: *span,
        },
    })
}

fn lower_seq(children: &[Node], state: &mut CompilerState, _span: Span) -> CompileResult<Vec<Op>> {
    lower_each(children, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_src(src: &str) -> CompiledTemplate {
        let ast = wisteria_parser::parse(src).expect("parse");
        compile(ast, &CompileOptions::default()).expect("compile")
    }

    #[test]
    fn duplicate_block_names_rejected() {
        let ast = wisteria_parser::parse(
            "{% block a %}1{% endblock %}{% block a %}2{% endblock %}",
        )
        .unwrap();
        let err = compile(ast, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateBlock { .. }));
    }

    #[test]
    fn multiple_extends_rejected() {
        let ast = wisteria_parser::parse("{% extends \"a\" %}{% extends \"b\" %}").unwrap();
        let err = compile(ast, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::MultipleExtends { .. }));
    }

    #[test]
    fn collects_nested_block_names() {
        let compiled = compile_src("{% block outer %}{% block inner %}x{% endblock %}{% endblock %}");
        assert!(compiled.blocks.contains_key("outer"));
        assert!(compiled.blocks.contains_key("inner"));
    }

    #[test]
    fn non_string_dict_key_rejected() {
        let ast = wisteria_parser::parse("{{ {1: 2} }}");
        // The parser itself rejects this per its own dict-key grammar check;
        // if it didn't, the compiler would catch it here as a backstop.
        if let Ok(ast) = ast {
            let err = compile(ast, &CompileOptions::default());
            assert!(err.is_err());
        }
    }
}
