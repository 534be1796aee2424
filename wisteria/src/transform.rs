//! The AST transformer: rewrites `Filter` nodes that invoke a
//! host-registered async filter into `FilterAsync` nodes, and promotes any
//! `{% for %}` loop whose body becomes async into `ForMode::AsyncEach`
//! (spec.md §4.3 "Transformer").
//!
//! A single top-down pass, grounded on `subset_julia_vm::lowering`'s
//! "one recursive rewrite fn per AST shape, reconstruct node after
//! recursing into children" structure.

use std::collections::HashSet;

use wisteria_parser::ast::{ForMode, Node, SwitchCase};

/// Rewrites an AST so async filter applications become explicit suspension
/// points. `async_filters` is the set of filter names the environment has
/// registered as async (`Environment::register_async_filter`); every other
/// filter name, known or not, is left as a plain `Filter` node — unknown
/// filters are a render-time error, not a compile-time one.
pub struct Transformer<'a> {
    async_filters: &'a HashSet<String>,
    counter: usize,
}

impl<'a> Transformer<'a> {
    pub fn new(async_filters: &'a HashSet<String>) -> Self {
        Transformer { async_filters, counter: 0 }
    }

    fn next_symbol(&mut self) -> String {
        let s = format!("__async{}", self.counter);
        self.counter += 1;
        s
    }

    pub fn transform(&mut self, node: Node) -> Node {
        match node {
            Node::Literal { .. } | Node::Symbol { .. } | Node::TemplateData { .. } => node,

            Node::Group { expr, span } => Node::Group { expr: self.boxed(expr), span },
            Node::ArrayNode { items, span } => {
                Node::ArrayNode { items: self.each(items), span }
            }
            Node::Dict { pairs, span } => Node::Dict {
                pairs: pairs.into_iter().map(|(k, v)| (self.transform(k), self.transform(v))).collect(),
                span,
            },
            Node::NodeList { children, span } => Node::NodeList { children: self.each(children), span },

            Node::BinOp { op, left, right, span } => Node::BinOp {
                op,
                left: self.boxed(left),
                right: self.boxed(right),
                span,
            },
            Node::UnaryOp { op, operand, span } => {
                Node::UnaryOp { op, operand: self.boxed(operand), span }
            }
            Node::Compare { expr, ops, span } => Node::Compare {
                expr: self.boxed(expr),
                ops: ops
                    .into_iter()
                    .map(|c| wisteria_parser::ast::CompareOp {
                        op: c.op,
                        expr: self.transform(c.expr),
                        span: c.span,
                    })
                    .collect(),
                span,
            },
            Node::In { negated, left, right, span } => Node::In {
                negated,
                left: self.boxed(left),
                right: self.boxed(right),
                span,
            },
            Node::Is { negated, left, name, args, span } => Node::Is {
                negated,
                left: self.boxed(left),
                name,
                args: self.each(args),
                span,
            },

            Node::LookupVal { target, value, span } => Node::LookupVal {
                target: self.boxed(target),
                value: self.boxed(value),
                span,
            },
            Node::FunCall { callee, args, span } => Node::FunCall {
                callee: self.boxed(callee),
                args: self.each(args),
                span,
            },
            Node::Filter { name, args, span } => {
                let args = self.each(args);
                if self.async_filters.contains(&name) {
                    let symbol = self.next_symbol();
                    Node::FilterAsync { name, args, symbol, span }
                } else {
                    Node::Filter { name, args, span }
                }
            }
            // Already async; re-walk args in case they nest another async filter.
            Node::FilterAsync { name, args, symbol, span } => {
                Node::FilterAsync { name, args: self.each(args), symbol, span }
            }
            Node::KeywordArgs { pairs, span } => Node::KeywordArgs {
                pairs: pairs.into_iter().map(|(k, v)| (k, self.transform(v))).collect(),
                span,
            },

            Node::If { cond, body, else_, span } => Node::If {
                cond: self.boxed(cond),
                body: self.boxed(body),
                else_: self.opt_boxed(else_),
                span,
            },
            Node::InlineIf { cond, body, else_, span } => Node::InlineIf {
                cond: self.boxed(cond),
                body: self.boxed(body),
                else_: self.opt_boxed(else_),
                span,
            },
            Node::Switch { expr, cases, default, span } => Node::Switch {
                expr: self.boxed(expr),
                cases: cases
                    .into_iter()
                    .map(|c| SwitchCase { value: self.transform(c.value), body: self.transform(c.body) })
                    .collect(),
                default: self.opt_boxed(default),
                span,
            },
            Node::For { mode, arr, target, body, else_, span } => {
                let arr = self.boxed(arr);
                let body = self.boxed(body);
                let else_ = self.opt_boxed(else_);
                // The grammar never spells AsyncEach/AsyncAll directly (see
                // `wisteria_parser::parser::statements::parse_for`); a loop
                // becomes async solely by virtue of an async filter
                // appearing somewhere in its body. AsyncEach (strictly
                // sequential, output-order-preserving) is the only mode this
                // pass synthesizes; AsyncAll is reachable only by
                // hand-constructing IR (e.g. a host extension), since no
                // template-source syntax requests concurrent iteration.
                let mode = if matches!(mode, ForMode::Sync) && contains_async(&body) {
                    ForMode::AsyncEach
                } else {
                    mode
                };
                Node::For { mode, arr, target, body, else_, span }
            }
            Node::Set { targets, value, span } => Node::Set { targets, value: self.boxed(value), span },

            Node::Root { children, span } => Node::Root { children: self.each(children), span },
            Node::Output { children, span } => Node::Output { children: self.each(children), span },
            Node::Block { name, body, span } => Node::Block { name, body: self.boxed(body), span },
            Node::Super { .. } => node,
            Node::Extends { template, span } => Node::Extends { template: self.boxed(template), span },
            Node::Include { template, ignore_missing, span } => Node::Include {
                template: self.boxed(template),
                ignore_missing,
                span,
            },
            Node::Import { template, target, with_context, span } => Node::Import {
                template: self.boxed(template),
                target,
                with_context,
                span,
            },
            Node::FromImport { template, names, with_context, span } => Node::FromImport {
                template: self.boxed(template),
                names,
                with_context,
                span,
            },
            Node::Macro { name, args, body, span } => Node::Macro {
                name,
                args: args
                    .into_iter()
                    .map(|a| wisteria_parser::ast::MacroArg {
                        name: a.name,
                        default: a.default.map(|d| self.transform(d)),
                    })
                    .collect(),
                body: self.boxed(body),
                span,
            },
            Node::CallBlock { call_args, callee, body, span } => Node::CallBlock {
                call_args,
                callee: self.boxed(callee),
                body: self.boxed(body),
                span,
            },
            Node::Capture { body, span } => Node::Capture { body: self.boxed(body), span },
            Node::CallExtension {
                ext_name,
                prop,
                args,
                content_args,
                autoescape,
                is_async,
                span,
            } => Node::CallExtension {
                ext_name,
                prop,
                args: self.each(args),
                content_args: self.each(content_args),
                autoescape,
                is_async,
                span,
            },
        }
    }

    fn boxed(&mut self, node: Box<Node>) -> Box<Node> {
        Box::new(self.transform(*node))
    }

    fn opt_boxed(&mut self, node: Option<Box<Node>>) -> Option<Box<Node>> {
        node.map(|n| self.boxed(n))
    }

    fn each(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        nodes.into_iter().map(|n| self.transform(n)).collect()
    }
}

/// True if `node` (already transformed) contains a suspension point at its
/// own level — used only to decide whether an *enclosing* `for` loop must
/// become async; it does not need to look inside nested `for`/`macro`
/// bodies, which manage their own suspension independently.
fn contains_async(node: &Node) -> bool {
    match node {
        Node::FilterAsync { .. } => true,
        Node::CallExtension { is_async, .. } => *is_async,
        Node::Literal { .. } | Node::Symbol { .. } | Node::TemplateData { .. } | Node::Super { .. } => {
            false
        }
        Node::Group { expr, .. } => contains_async(expr),
        Node::ArrayNode { items, .. } => items.iter().any(contains_async),
        Node::Dict { pairs, .. } => pairs.iter().any(|(k, v)| contains_async(k) || contains_async(v)),
        Node::NodeList { children, .. } | Node::Root { children, .. } | Node::Output { children, .. } => {
            children.iter().any(contains_async)
        }
        Node::BinOp { left, right, .. } => contains_async(left) || contains_async(right),
        Node::UnaryOp { operand, .. } => contains_async(operand),
        Node::Compare { expr, ops, .. } => {
            contains_async(expr) || ops.iter().any(|c| contains_async(&c.expr))
        }
        Node::In { left, right, .. } => contains_async(left) || contains_async(right),
        Node::Is { left, args, .. } => contains_async(left) || args.iter().any(contains_async),
        Node::LookupVal { target, value, .. } => contains_async(target) || contains_async(value),
        Node::FunCall { callee, args, .. } => contains_async(callee) || args.iter().any(contains_async),
        Node::Filter { args, .. } => args.iter().any(contains_async),
        Node::KeywordArgs { pairs, .. } => pairs.iter().any(|(_, v)| contains_async(v)),
        Node::If { cond, body, else_, .. } => {
            contains_async(cond) || contains_async(body) || else_.as_deref().is_some_and(contains_async)
        }
        Node::InlineIf { cond, body, else_, .. } => {
            contains_async(cond) || contains_async(body) || else_.as_deref().is_some_and(contains_async)
        }
        Node::Switch { expr, cases, default, .. } => {
            contains_async(expr)
                || cases.iter().any(|c| contains_async(&c.value) || contains_async(&c.body))
                || default.as_deref().is_some_and(contains_async)
        }
        // A nested for-loop manages its own suspension; it doesn't force the
        // outer loop to become async merely by containing one.
        Node::For { .. } => false,
        Node::Set { value, .. } => contains_async(value),
        Node::Block { body, .. } => contains_async(body),
        Node::Extends { template, .. } => contains_async(template),
        Node::Include { template, .. } => contains_async(template),
        Node::Import { template, .. } => contains_async(template),
        Node::FromImport { template, .. } => contains_async(template),
        // Macro bodies run in their own call frame at invocation time.
        Node::Macro { .. } => false,
        Node::CallBlock { callee, body, .. } => contains_async(callee) || contains_async(body),
        Node::Capture { body, .. } => contains_async(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisteria_parser::span::Span;

    fn filter(name: &str) -> Node {
        Node::Filter { name: name.into(), args: vec![], span: Span::empty() }
    }

    #[test]
    fn rewrites_registered_async_filter() {
        let mut async_filters = HashSet::new();
        async_filters.insert("fetch".to_string());
        let mut t = Transformer::new(&async_filters);
        let out = t.transform(filter("fetch"));
        assert!(matches!(out, Node::FilterAsync { name, .. } if name == "fetch"));
    }

    #[test]
    fn leaves_unregistered_filter_alone() {
        let async_filters = HashSet::new();
        let mut t = Transformer::new(&async_filters);
        let out = t.transform(filter("upper"));
        assert!(matches!(out, Node::Filter { .. }));
    }

    #[test]
    fn promotes_for_loop_containing_async_filter() {
        let mut async_filters = HashSet::new();
        async_filters.insert("fetch".into());
        let mut t = Transformer::new(&async_filters);
        let body = Node::Output { children: vec![filter("fetch")], span: Span::empty() };
        let for_node = Node::For {
            mode: ForMode::Sync,
            arr: Box::new(Node::Symbol { name: "items".into(), span: Span::empty() }),
            target: wisteria_parser::ast::ForTarget::Single("x".into()),
            body: Box::new(body),
            else_: None,
            span: Span::empty(),
        };
        let out = t.transform(for_node);
        match out {
            Node::For { mode, .. } => assert_eq!(mode, ForMode::AsyncEach),
            _ => panic!("expected For"),
        }
    }
}
