// src/fetch/mod.rs
// =============================================================================
// The fetch engine: turns a URL into a parsed page.
//
// The crawl engine only talks to the Fetcher trait, so anything that can open
// a page, send a HEAD request and download a file can drive a crawl.
//
// Submodules:
// - http:   reqwest + scraper implementation used by the command line tool
// - memory: in-memory link graph, for tests and for embedding programs
// - html:   link and form extraction shared by the HTTP fetcher
// - error:  FetchError
// =============================================================================

mod error;
mod html;
mod http;
mod memory;

pub use error::FetchError;
pub use http::{HttpFetcher, DEFAULT_USER_AGENT};
pub use memory::StaticFetcher;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;

/// Anything able to fetch pages for the spider and its plugins.
///
/// Shared between all workers and plugins as `Arc<dyn Fetcher>`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GETs `url` and parses it. Non-success statuses are errors.
    async fn open(&self, url: &str) -> Result<Page, FetchError>;

    /// Sends a HEAD request. The returned page carries headers only.
    async fn head(&self, url: &str) -> Result<Page, FetchError>;

    /// Saves the body of `url` to `dest`, creating parent directories.
    /// Returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// A `<form>` element found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    /// Absolute submit URL (the page URL when the form has no action).
    pub action: String,
    /// Lowercased submit method, "get" when unspecified.
    pub method: String,
    /// Every attribute on the element, names lowercased.
    pub attributes: HashMap<String, String>,
}

impl Form {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// A fetched page: headers, categorized links and forms.
#[derive(Debug, Clone, Default)]
pub struct Page {
    url: String,
    headers: HashMap<String, String>,
    links: BTreeMap<String, Vec<String>>,
    forms: Vec<Form>,
}

impl Page {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_links<I, S>(mut self, category: &str, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links
            .entry(category.to_string())
            .or_default()
            .extend(links.into_iter().map(Into::into));
        self
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.forms.push(form);
        self
    }

    /// URL the page was served from (after redirects).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Case-insensitive response header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn links(&self) -> &BTreeMap<String, Vec<String>> {
        &self.links
    }

    /// Links of one category, empty when the category is absent.
    pub fn links_in(&self, category: &str) -> &[String] {
        self.links.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every link of every category, flattened.
    pub fn all_links(&self) -> impl Iterator<Item = &str> {
        self.links.values().flatten().map(String::as_str)
    }

    pub fn forms(&self) -> &[Form] {
        &self.forms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let page = Page::new("http://example.com/").with_header("Server", "nginx");
        assert_eq!(page.header("server"), Some("nginx"));
        assert_eq!(page.header("SERVER"), Some("nginx"));
        assert_eq!(page.header("x-missing"), None);
    }

    #[test]
    fn test_all_links_flattens_categories() {
        let page = Page::new("http://example.com/")
            .with_links("href", ["http://example.com/a.html"])
            .with_links("src", ["http://example.com/b.png"]);

        let all: Vec<&str> = page.all_links().collect();
        assert_eq!(all, vec!["http://example.com/a.html", "http://example.com/b.png"]);
        assert_eq!(page.links_in("href").len(), 1);
        assert!(page.links_in("action").is_empty());
    }
}
