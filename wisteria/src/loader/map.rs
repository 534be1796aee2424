//! An in-memory loader over a fixed `name -> source` map, used for tests
//! and for embedding templates directly in host binaries (spec.md §6).

use std::collections::HashMap;

use super::{Loader, LoaderError};

#[derive(Debug, Default)]
pub struct MapLoader {
    templates: HashMap<String, String>,
}

impl MapLoader {
    pub fn new() -> Self {
        MapLoader::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl FromIterator<(String, String)> for MapLoader {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        MapLoader { templates: iter.into_iter().collect() }
    }
}

impl Loader for MapLoader {
    fn load(&self, name: &str) -> Result<String, LoaderError> {
        self.templates.get(name).cloned().ok_or_else(|| LoaderError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_inserted_template() {
        let loader = MapLoader::new().with("greet.html", "Hi {{ name }}");
        assert_eq!(loader.load("greet.html").unwrap(), "Hi {{ name }}");
    }

    #[test]
    fn missing_name_errors() {
        let loader = MapLoader::new();
        assert!(matches!(loader.load("nope"), Err(LoaderError::NotFound(_))));
    }
}
