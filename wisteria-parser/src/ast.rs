//! The typed abstract syntax tree.
//!
//! Per spec.md §9 Design Notes ("Replace string-name method dispatch with a
//! tagged-variant AST plus pattern-matched visitors; this also gives
//! exhaustiveness checks"), `Node` is a single tagged `enum` rather than the
//! generic `CstNode`-with-`NodeKind`-tag shape the teacher uses one layer
//! above the AST (see `subset_julia_vm_parser::cst::CstNode`); the shape here
//! is grounded instead on the teacher's own typed IR one layer *below* its
//! CST, `subset_julia_vm::ir::core::{Expr, Stmt}` (struct-style enum
//! variants, one `Span` field per variant, `Box<Expr>` for child
//! expressions).

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A literal value as spelled in source. Numeric/boolean/null conversion
/// happens once at parse time; the compiler never re-parses literal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Add,
    Concat,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOpKind {
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareOp {
    pub op: CompareOpKind,
    pub expr: Node,
    pub span: Span,
}

/// A single `{% for %}` binding shape: `for x in arr`, `for (a, b) in arr`, or
/// `for k, v in map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForTarget {
    Single(String),
    Tuple(Vec<String>),
    KeyValue(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForMode {
    Sync,
    AsyncEach,
    AsyncAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroArg {
    pub name: String,
    pub default: Option<Node>,
}

/// One arm of a `{% switch %}` construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Node,
    /// Empty body means "fall through to the next case" — spec.md §9's
    /// documented open question: preserved verbatim rather than "fixed", see
    /// `wisteria::compiler::stmt::compile_switch`.
    pub body: Node,
}

/// `{% from "tpl" import name [as alias], ... %}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

/// The typed AST. Every variant carries the span of the source it covers so
/// the compiler can thread coordinates into render-time errors (the `Span`
/// invariant in spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    // ---- expression leaves ----
    Literal { value: Literal, span: Span },
    Symbol { name: String, span: Span },
    TemplateData { text: String, span: Span },

    // ---- aggregates ----
    Group { expr: Box<Node>, span: Span },
    ArrayNode { items: Vec<Node>, span: Span },
    Dict { pairs: Vec<(Node, Node)>, span: Span },
    NodeList { children: Vec<Node>, span: Span },

    // ---- operators ----
    BinOp { op: BinOp, left: Box<Node>, right: Box<Node>, span: Span },
    UnaryOp { op: UnaryOp, operand: Box<Node>, span: Span },
    Compare { expr: Box<Node>, ops: Vec<CompareOp>, span: Span },
    In { negated: bool, left: Box<Node>, right: Box<Node>, span: Span },
    Is { negated: bool, left: Box<Node>, name: String, args: Vec<Node>, span: Span },

    // ---- access/call ----
    LookupVal { target: Box<Node>, value: Box<Node>, span: Span },
    FunCall { callee: Box<Node>, args: Vec<Node>, span: Span },
    Filter { name: String, args: Vec<Node>, span: Span },
    FilterAsync { name: String, args: Vec<Node>, symbol: String, span: Span },
    KeywordArgs { pairs: Vec<(String, Node)>, span: Span },

    // ---- control ----
    If { cond: Box<Node>, body: Box<Node>, else_: Option<Box<Node>>, span: Span },
    InlineIf { cond: Box<Node>, body: Box<Node>, else_: Option<Box<Node>>, span: Span },
    Switch { expr: Box<Node>, cases: Vec<SwitchCase>, default: Option<Box<Node>>, span: Span },
    For {
        mode: ForMode,
        arr: Box<Node>,
        target: ForTarget,
        body: Box<Node>,
        else_: Option<Box<Node>>,
        span: Span,
    },
    Set { targets: Vec<String>, value: Box<Node>, span: Span },

    // ---- structure ----
    Root { children: Vec<Node>, span: Span },
    Output { children: Vec<Node>, span: Span },
    Block { name: String, body: Box<Node>, span: Span },
    Super { block_name: String, symbol: String, span: Span },
    Extends { template: Box<Node>, span: Span },
    Include { template: Box<Node>, ignore_missing: bool, span: Span },
    Import { template: Box<Node>, target: String, with_context: bool, span: Span },
    FromImport {
        template: Box<Node>,
        names: Vec<ImportName>,
        with_context: bool,
        span: Span,
    },
    Macro { name: String, args: Vec<MacroArg>, body: Box<Node>, span: Span },
    /// `{% call(args) callee(...) %}body{% endcall %}` — the callee `FunCall`
    /// plus the captured content block that becomes its implicit `caller`
    /// keyword argument (spec.md §3's `Caller` node, folded into the call
    /// site it belongs to rather than floating free).
    CallBlock { call_args: Vec<MacroArg>, callee: Box<Node>, body: Box<Node>, span: Span },
    /// `{% set x %}...{% endset %}` — captures its body into a buffer and
    /// yields the captured string as a value (spec.md §4.5 "Capture").
    Capture { body: Box<Node>, span: Span },
    CallExtension {
        ext_name: String,
        prop: String,
        args: Vec<Node>,
        content_args: Vec<Node>,
        autoescape: bool,
        is_async: bool,
        span: Span,
    },
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Literal { span, .. }
            | Node::Symbol { span, .. }
            | Node::TemplateData { span, .. }
            | Node::Group { span, .. }
            | Node::ArrayNode { span, .. }
            | Node::Dict { span, .. }
            | Node::NodeList { span, .. }
            | Node::BinOp { span, .. }
            | Node::UnaryOp { span, .. }
            | Node::Compare { span, .. }
            | Node::In { span, .. }
            | Node::Is { span, .. }
            | Node::LookupVal { span, .. }
            | Node::FunCall { span, .. }
            | Node::Filter { span, .. }
            | Node::FilterAsync { span, .. }
            | Node::KeywordArgs { span, .. }
            | Node::If { span, .. }
            | Node::InlineIf { span, .. }
            | Node::Switch { span, .. }
            | Node::For { span, .. }
            | Node::Set { span, .. }
            | Node::Root { span, .. }
            | Node::Output { span, .. }
            | Node::Block { span, .. }
            | Node::Super { span, .. }
            | Node::Extends { span, .. }
            | Node::Include { span, .. }
            | Node::Import { span, .. }
            | Node::FromImport { span, .. }
            | Node::Macro { span, .. }
            | Node::CallBlock { span, .. }
            | Node::Capture { span, .. }
            | Node::CallExtension { span, .. } => *span,
        }
    }

    /// True if the last positional argument in `args` is a keyword-args dict,
    /// per spec.md §3's invariant "the last positional argument to a call is
    /// treated as keyword-args iff flagged".
    pub fn trailing_kwargs(args: &[Node]) -> Option<&[(String, Node)]> {
        match args.last() {
            Some(Node::KeywordArgs { pairs, .. }) => Some(pairs),
            _ => None,
        }
    }

    pub fn children(children: Vec<Node>, span: Span) -> Node {
        Node::NodeList { children, span }
    }
}
