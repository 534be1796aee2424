//! Template loaders: the `getTemplate` half of the Environment contract
//! (spec.md §6). `Loader::load` resolves a template name to source text;
//! `Environment` owns the compiled-template cache on top of it (spec.md §6
//! "Environment contract ... getTemplate(name, eagerCompile, parentName,
//! ignoreMissing, cb)").
//!
//! Hot-reload is an explicit Non-goal (spec.md §1), so a loader may cache
//! source text for its own lifetime without an invalidation story.

mod filesystem;
mod map;

#[cfg(feature = "http-loader")]
mod http;

pub use filesystem::FileSystemLoader;
pub use map::MapLoader;

#[cfg(feature = "http-loader")]
pub use http::HttpLoader;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("io error loading '{name}': {message}")]
    Io { name: String, message: String },
    #[cfg(feature = "http-loader")]
    #[error("http error loading '{name}': {message}")]
    Http { name: String, message: String },
}

/// Resolves a template name to source text. Implementations are read-mostly
/// during rendering (spec.md §5 "Shared resources").
pub trait Loader: std::fmt::Debug {
    fn load(&self, name: &str) -> Result<String, LoaderError>;
}
