//! A compiled template, per spec.md §6 "Template contract":
//! `rootRenderFunc`, `getExported`, `blocks`.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::compiler::CompiledTemplate;
use crate::context::Context;
use crate::environment::Environment;
use crate::error::{RenderError, RenderResult};
use crate::exec;
use crate::frame::Frame;
use crate::ir::Op;
use crate::value::Value;

#[derive(Debug)]
pub struct Template {
    pub name: String,
    pub root: Rc<Op>,
    pub blocks: IndexMap<String, Rc<Op>>,
    pub throw_on_undefined: bool,
    /// Computed once at compile time (spec.md §2 "Render entry points"):
    /// true if `root` or any block contains a suspension point, in which
    /// case `render` (sync) must refuse and `render_async` is required.
    pub requires_async: bool,
}

impl Template {
    pub fn from_compiled(name: impl Into<String>, compiled: CompiledTemplate) -> Self {
        let requires_async =
            compiled.root.requires_async() || compiled.blocks.values().any(|b| b.requires_async());
        Template {
            name: name.into(),
            root: compiled.root,
            blocks: compiled.blocks,
            throw_on_undefined: compiled.throw_on_undefined,
            requires_async,
        }
    }

    /// Registers this template's own blocks into a fresh context, in
    /// declaration order, so that `context.getBlock` resolves to them
    /// before any `Extends` execution pushes a parent's implementations on
    /// top (spec.md §4.5 "Extends").
    pub fn seed_context(&self, context: &mut Context) {
        for (name, body) in &self.blocks {
            context.add_block(name, body.clone());
        }
    }

    pub fn render(&self, env: &Environment, vars: IndexMap<String, Value>) -> RenderResult<String> {
        if self.requires_async {
            return Err(RenderError::SyncOnly);
        }
        futures::executor::block_on(self.render_async(env, vars))
    }

    pub async fn render_async(
        &self,
        env: &Environment,
        vars: IndexMap<String, Value>,
    ) -> RenderResult<String> {
        let mut context = Context::new(vars);
        self.seed_context(&mut context);
        let context = Rc::new(RefCell::new(context));
        let frame = Frame::new();
        exec::render_root(env, self, context, frame).await
    }

    /// `getExported(vars?, frame?, cb(err, map))`: renders the template to
    /// completion purely for its side effect on `context.exported`, then
    /// returns that map — what `{% import %}`/`{% from … import … %}` bind
    /// into the importing template's frame.
    pub async fn get_exported(
        &self,
        env: &Environment,
        vars: IndexMap<String, Value>,
    ) -> RenderResult<IndexMap<String, Value>> {
        let mut context = Context::new(vars);
        self.seed_context(&mut context);
        let context = Rc::new(RefCell::new(context));
        let frame = Frame::new();
        exec::render_root(env, self, context.clone(), frame).await?;
        let exported = context.borrow().exported().clone();
        Ok(exported)
    }
}
