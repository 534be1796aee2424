//! Per-render state: user variables, the block-override chain, and the set
//! of names a template exports to importers — spec.md §6 "Context contract".

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ir::Op;
use crate::template::Template;
use crate::value::Value;

/// Created fresh for every `render`/`render_async` call; never shared
/// across renders (spec.md §5 "Shared resources").
#[derive(Debug)]
pub struct Context {
    vars: IndexMap<String, Value>,
    exported: IndexMap<String, Value>,
    /// Per-name override chain, most-derived first — spec.md §4.5 "Extends:
    /// … copy each of its block entries into `context.addBlock` so child
    /// overrides already in scope take precedence".
    blocks: HashMap<String, Vec<Rc<Op>>>,
    /// Set once an `extends` resolves; the root render wrapper checks this
    /// after running the child body and, if set, renders the parent
    /// instead (spec.md §4.5 "Root").
    pub parent_template: Option<Rc<Template>>,
}

impl Context {
    pub fn new(vars: IndexMap<String, Value>) -> Self {
        Context { vars, exported: IndexMap::new(), blocks: HashMap::new(), parent_template: None }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get_variables(&self) -> &IndexMap<String, Value> {
        &self.vars
    }

    /// Exports `name` with an explicit value, or with its current variable
    /// value when `value` is `None` — spec.md §4.5 "Set": "for names not
    /// starting with `_`, also calls `context.addExport`".
    pub fn add_export(&mut self, name: &str, value: Option<Value>) {
        let v = value.unwrap_or_else(|| self.vars.get(name).cloned().unwrap_or(Value::Undefined));
        self.exported.insert(name.to_string(), v);
    }

    pub fn exported(&self) -> &IndexMap<String, Value> {
        &self.exported
    }

    /// Registers a block implementation for `name`. Template registration
    /// pushes the child's own implementation first; `Extends` execution
    /// then pushes the parent's — so `get_block` (index 0) still resolves
    /// to the child's override.
    pub fn add_block(&mut self, name: &str, body: Rc<Op>) {
        self.blocks.entry(name.to_string()).or_default().push(body);
    }

    pub fn get_block(&self, name: &str) -> Option<Rc<Op>> {
        self.blocks.get(name).and_then(|v| v.first()).cloned()
    }

    /// The implementation one step up the override chain from `current` —
    /// what `{{ super() }}` renders (spec.md §4.5 "Super").
    pub fn get_super(&self, name: &str, current: &Rc<Op>) -> Option<Rc<Op>> {
        let chain = self.blocks.get(name)?;
        let idx = chain.iter().position(|b| Rc::ptr_eq(b, current))?;
        chain.get(idx + 1).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_op() -> Rc<Op> {
        Rc::new(Op::Text("x".into()))
    }

    #[test]
    fn child_block_takes_precedence_over_parent() {
        let mut ctx = Context::new(IndexMap::new());
        let child = dummy_op();
        let parent = dummy_op();
        ctx.add_block("b", child.clone());
        ctx.add_block("b", parent.clone());
        assert!(Rc::ptr_eq(&ctx.get_block("b").unwrap(), &child));
        assert!(Rc::ptr_eq(&ctx.get_super("b", &child).unwrap(), &parent));
        assert!(ctx.get_super("b", &parent).is_none());
    }

    #[test]
    fn export_defaults_to_current_variable_value() {
        let mut ctx = Context::new(IndexMap::new());
        ctx.set_variable("x", Value::Int(42));
        ctx.add_export("x", None);
        assert!(matches!(ctx.exported().get("x"), Some(Value::Int(42))));
    }
}
