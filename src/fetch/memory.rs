// src/fetch/memory.rs
// =============================================================================
// An in-memory fetcher.
//
// Serves a fixed link graph and a set of downloadable files from memory. The
// spider's own tests run the real worker pool against it, and embedding
// programs can use it to dry-run plugins without touching the network.
//
// Every open() is recorded so callers can check exactly which URLs were
// fetched, in which order.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;

use super::{FetchError, Fetcher, Page};

#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Page>,
    files: HashMap<String, Vec<u8>>,
    opened: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    // Adds a page whose "href" links are `links`
    pub fn with_page<I, S>(self, url: &str, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_full_page(Page::new(url).with_links("href", links))
    }

    // Adds a fully built page, keyed by its URL
    pub fn with_full_page(mut self, page: Page) -> Self {
        self.pages.insert(page.url().to_string(), page);
        self
    }

    pub fn with_file(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), body.into());
        self
    }

    /// Makes every open() take `delay`, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs passed to open(), in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn open(&self, url: &str) -> Result<Page, FetchError> {
        self.opened.lock().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }

    async fn head(&self, url: &str) -> Result<Page, FetchError> {
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;

        let mut head = Page::new(url);
        for (name, value) in page_headers(page) {
            head = head.with_header(name, value);
        }
        Ok(head)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let body = self
            .files
            .get(url)
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;

        let io_error = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        fs::write(dest, body).await.map_err(io_error)?;
        Ok(body.len() as u64)
    }
}

// Headers worth echoing on a HEAD request
fn page_headers(page: &Page) -> Vec<(&'static str, String)> {
    ["server", "content-type", "location"]
        .into_iter()
        .filter_map(|name| page.header(name).map(|value| (name, value.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_records_calls() {
        let fetcher = StaticFetcher::new().with_page("http://example.com/", ["http://example.com/a.html"]);

        let page = fetcher.open("http://example.com/").await.unwrap();
        assert_eq!(page.links_in("href"), ["http://example.com/a.html"]);
        assert!(matches!(
            fetcher.open("http://example.com/missing.html").await,
            Err(FetchError::NotFound(_))
        ));
        assert_eq!(
            fetcher.opened(),
            vec!["http://example.com/", "http://example.com/missing.html"]
        );
    }

    #[tokio::test]
    async fn test_head_keeps_headers_only() {
        let fetcher = StaticFetcher::new().with_full_page(
            Page::new("http://example.com/")
                .with_header("Server", "Apache")
                .with_links("href", ["http://example.com/a.html"]),
        );

        let head = fetcher.head("http://example.com/").await.unwrap();
        assert_eq!(head.header("server"), Some("Apache"));
        assert_eq!(head.all_links().count(), 0);
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/file.pdf");
        let fetcher = StaticFetcher::new().with_file("http://example.com/file.pdf", b"%PDF".to_vec());

        let written = fetcher
            .download("http://example.com/file.pdf", &dest)
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF");
    }
}
