//! Resolves a template name to a path under one or more search directories,
//! caching source text by name for the loader's lifetime (spec.md §6,
//! grounded on `subset_julia_vm::loader`'s search-path + on-disk resolution
//! shape, sans its SHA256 compile cache — Wisteria's compiled-template
//! cache lives on `Environment` instead, see `crate::environment`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::{Loader, LoaderError};

#[derive(Debug)]
pub struct FileSystemLoader {
    roots: Vec<PathBuf>,
    cache: RefCell<HashMap<String, String>>,
}

impl FileSystemLoader {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        FileSystemLoader { roots: roots.into_iter().collect(), cache: RefCell::new(HashMap::new()) }
    }
}

impl Loader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String, LoaderError> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        for root in &self.roots {
            let candidate = root.join(name);
            match fs::read_to_string(&candidate) {
                Ok(source) => {
                    self.cache.borrow_mut().insert(name.to_string(), source.clone());
                    return Ok(source);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(LoaderError::Io { name: name.to_string(), message: e.to_string() })
                }
            }
        }
        Err(LoaderError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_caches_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "Hello {{ name }}").unwrap();
        let loader = FileSystemLoader::new([dir.path().to_path_buf()]);
        assert_eq!(loader.load("hello.txt").unwrap(), "Hello {{ name }}");
        // second call hits the cache, not the filesystem
        std::fs::remove_file(dir.path().join("hello.txt")).unwrap();
        assert_eq!(loader.load("hello.txt").unwrap(), "Hello {{ name }}");
    }

    #[test]
    fn missing_template_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileSystemLoader::new([dir.path().to_path_buf()]);
        assert!(matches!(loader.load("nope.txt"), Err(LoaderError::NotFound(_))));
    }
}
