//! Fetches template source over HTTP(S). `ureq` is itself a blocking
//! client, so this loader stays synchronous like its siblings — "async" in
//! this crate describes the render/filter pipeline, not template I/O
//! (spec.md §5, §6).

use once_cell::sync::Lazy;

use super::{Loader, LoaderError};

static AGENT: Lazy<ureq::Agent> = Lazy::new(|| ureq::AgentBuilder::new().build());

/// Loads template source by treating a template name as a path appended to
/// `base_url`. Responses are not cached; the caller relies on
/// `Environment`'s compiled-template cache to avoid refetching on every
/// render (spec.md §6, hot-reload is an explicit Non-goal so staleness
/// within a process lifetime is acceptable).
#[derive(Debug)]
pub struct HttpLoader {
    base_url: String,
}

impl HttpLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if base_url.ends_with('/') {
            base_url.pop();
        }
        HttpLoader { base_url }
    }
}

impl Loader for HttpLoader {
    fn load(&self, name: &str) -> Result<String, LoaderError> {
        let url = format!("{}/{}", self.base_url, name.trim_start_matches('/'));
        let response = AGENT.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(404, _) => LoaderError::NotFound(name.to_string()),
            other => LoaderError::Http { name: name.to_string(), message: other.to_string() },
        })?;
        response
            .into_string()
            .map_err(|e| LoaderError::Http { name: name.to_string(), message: e.to_string() })
    }
}
