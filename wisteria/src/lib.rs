//! Wisteria: a Jinja2/nunjucks-lineage template engine.
//!
//! Source flows lexer → parser (`wisteria_parser`) → [`transform`] →
//! [`compiler`] → [`exec`], the same pipeline shape spec.md §2 describes,
//! realized here as a typed [`ir::Op`] tree walked by an async
//! tree-walking interpreter rather than a textual-IR/CPS codegen (spec.md
//! §9 Design Notes sanctions this substitution explicitly).

pub mod builtin_tests;
pub mod compiler;
pub mod context;
pub mod environment;
pub mod error;
pub mod exec;
pub mod extension;
pub mod filters;
pub mod frame;
pub mod ir;
pub mod loader;
pub mod template;
pub mod transform;
pub mod value;

pub use context::Context;
pub use environment::{Environment, EnvironmentError, EnvironmentOptions, EnvironmentResult};
pub use error::{CompileError, RenderError, RenderResult};
pub use frame::Frame;
pub use ir::Op;
pub use template::Template;
pub use value::{MacroValue, NativeValue, Value};

pub use wisteria_parser::Span;
