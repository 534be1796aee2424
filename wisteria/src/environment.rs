//! The shared, render-spanning façade: loader, registered filters/tests/
//! extensions, globals, and the compiled-template cache (spec.md §6
//! "Environment contract"). One `Environment` is built once and reused
//! across many independent renders (spec.md §5 "Shared resources").

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::builtin_tests::{self, Test};
use crate::compiler::{self, CompileOptions};
use crate::error::CompileError;
use crate::extension::{AsyncExtension, Extension};
use crate::filters::{self, AsyncFilter, Filter};
use crate::loader::{Loader, LoaderError};
use crate::template::Template;
use crate::transform::Transformer;
use crate::value::Value;
use wisteria_parser::ParseError;

#[derive(Error, Debug, Clone)]
pub enum EnvironmentError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type EnvironmentResult<T> = Result<T, EnvironmentError>;

/// Render-wide options, set once when building the environment (spec.md §6
/// "Environment contract": `opts.autoescape`, `opts.throwOnUndefined`).
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentOptions {
    pub autoescape: bool,
    pub throw_on_undefined: bool,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        EnvironmentOptions { autoescape: true, throw_on_undefined: false }
    }
}

pub struct Environment {
    loader: Box<dyn Loader>,
    filters: HashMap<String, Box<dyn Filter>>,
    async_filters: HashMap<String, Box<dyn AsyncFilter>>,
    tests: HashMap<String, Box<dyn Test>>,
    extensions: HashMap<String, Box<dyn Extension>>,
    async_extensions: HashMap<String, Box<dyn AsyncExtension>>,
    globals: IndexMap<String, Value>,
    cache: RefCell<HashMap<String, Rc<Template>>>,
    pub opts: EnvironmentOptions,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("tests", &self.tests.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Environment {
    pub fn new(loader: Box<dyn Loader>) -> Self {
        Environment {
            loader,
            filters: filters::builtins(),
            async_filters: HashMap::new(),
            tests: builtin_tests::builtins(),
            extensions: HashMap::new(),
            async_extensions: HashMap::new(),
            globals: IndexMap::new(),
            cache: RefCell::new(HashMap::new()),
            opts: EnvironmentOptions::default(),
        }
    }

    pub fn with_opts(mut self, opts: EnvironmentOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn register_filter(&mut self, name: impl Into<String>, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.insert(name.into(), filter);
        self
    }

    pub fn register_async_filter(
        &mut self,
        name: impl Into<String>,
        filter: Box<dyn AsyncFilter>,
    ) -> &mut Self {
        self.async_filters.insert(name.into(), filter);
        self
    }

    pub fn register_test(&mut self, name: impl Into<String>, test: Box<dyn Test>) -> &mut Self {
        self.tests.insert(name.into(), test);
        self
    }

    pub fn register_extension(&mut self, name: impl Into<String>, ext: Box<dyn Extension>) -> &mut Self {
        self.extensions.insert(name.into(), ext);
        self
    }

    pub fn register_async_extension(
        &mut self,
        name: impl Into<String>,
        ext: Box<dyn AsyncExtension>,
    ) -> &mut Self {
        self.async_extensions.insert(name.into(), ext);
        self
    }

    pub fn add_global(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.globals.insert(name.into(), value);
        self
    }

    pub fn globals(&self) -> &IndexMap<String, Value> {
        &self.globals
    }

    pub fn get_filter(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|b| b.as_ref())
    }

    pub fn get_async_filter(&self, name: &str) -> Option<&dyn AsyncFilter> {
        self.async_filters.get(name).map(|b| b.as_ref())
    }

    pub fn get_test(&self, name: &str) -> Option<&dyn Test> {
        self.tests.get(name).map(|b| b.as_ref())
    }

    pub fn get_extension(&self, name: &str) -> Option<&dyn Extension> {
        self.extensions.get(name).map(|b| b.as_ref())
    }

    pub fn get_async_extension(&self, name: &str) -> Option<&dyn AsyncExtension> {
        self.async_extensions.get(name).map(|b| b.as_ref())
    }

    /// Names registered via `register_async_filter`, handed to the
    /// [`Transformer`] so it knows which `Filter` applications to rewrite
    /// into suspension points.
    pub fn async_filter_names(&self) -> HashSet<String> {
        self.async_filters.keys().cloned().collect()
    }

    /// Parses, transforms, and lowers `source` into a compiled template
    /// without touching the loader or cache — used for inline strings and by
    /// [`Environment::get_template`] once source has been loaded.
    pub fn compile(&self, source: &str, name: &str) -> EnvironmentResult<Template> {
        let ast = wisteria_parser::parse(source)?;
        let async_filters = self.async_filter_names();
        let ast = Transformer::new(&async_filters).transform(ast);
        let compiled = compiler::compile(ast, &CompileOptions { throw_on_undefined: self.opts.throw_on_undefined })?;
        Ok(Template::from_compiled(name, compiled))
    }

    /// `getTemplate(name, eagerCompile, parentName, ignoreMissing, cb)`
    /// narrowed to its synchronous core: load source via the loader, compile
    /// it, and cache the result for the environment's lifetime (spec.md §6).
    /// `parentName`/`ignoreMissing` are the caller's concern (`Op::Extends`/
    /// `Op::Include` resolve relative names and swallow `NotFound`
    /// themselves); `eagerCompile` is moot for a tree-walker, which has no
    /// separate "compile now vs. compile on first render" distinction.
    pub fn get_template(&self, name: &str) -> EnvironmentResult<Rc<Template>> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let source = self.loader.load(name)?;
        let template = Rc::new(self.compile(&source, name)?);
        self.cache.borrow_mut().insert(name.to_string(), template.clone());
        Ok(template)
    }

    /// Identical to [`Environment::get_template`]: the loader trait is
    /// synchronous even for `HttpLoader` (spec.md §6, see `crate::loader`),
    /// so there is no genuinely async path to take here — this exists so
    /// call sites inside `async fn` bodies (e.g. `Op::Extends`/`Op::Include`
    /// execution) don't need a blocking-call caveat of their own.
    pub async fn get_template_async(&self, name: &str) -> EnvironmentResult<Rc<Template>> {
        self.get_template(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MapLoader;

    #[test]
    fn compiles_and_caches_templates() {
        let loader = MapLoader::new().with("hello.txt", "Hi {{ name }}");
        let env = Environment::new(Box::new(loader));
        let first = env.get_template("hello.txt").unwrap();
        let second = env.get_template("hello.txt").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_template_surfaces_loader_error() {
        let env = Environment::new(Box::new(MapLoader::new()));
        assert!(matches!(env.get_template("nope"), Err(EnvironmentError::Loader(_))));
    }

    #[test]
    fn async_filter_registration_feeds_transform() {
        let mut env = Environment::new(Box::new(MapLoader::new()));
        env.register_async_filter(
            "fetch",
            crate::filters::boxed_async_fn(|_, args| {
                let v = args.first().cloned().unwrap_or(Value::Undefined);
                Box::pin(async move { Ok(v) })
            }),
        );
        let tmpl = env.compile("{{ x | fetch }}", "t").unwrap();
        assert!(tmpl.requires_async);
    }
}
