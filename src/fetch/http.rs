// src/fetch/http.rs
// =============================================================================
// The HTTP fetcher used by the command line tool.
//
// One reqwest Client is built per run and shared by every worker and plugin,
// so connections are pooled across the whole crawl. The client carries the
// run's request headers, cookies, proxy and read timeout.
//
// Pages are parsed with scraper (see html.rs) before open() returns.
// =============================================================================

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT};
use reqwest::{Client, Proxy, Response};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use super::html::parse_document;
use super::{FetchError, Fetcher, Page};
use crate::config::CrawlConfig;

/// User agent sent when the configuration does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("link-spider/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by reqwest and scraper.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(default_headers(config));

        if let Some(proxy) = &config.proxy {
            let proxy_url = format!("http://{}:{}", proxy.host, proxy.port);
            let proxy = Proxy::all(&proxy_url)
                .map_err(|e| FetchError::Client(format!("proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    async fn send_checked(&self, url: &str) -> Result<Response, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

// Builds the header map sent with every request
//
// Headers that are not valid HTTP are skipped with a warning rather than
// failing the whole run.
fn default_headers(config: &CrawlConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid request header"),
        }
    }

    if !config.cookies.is_empty() {
        let mut pairs: Vec<_> = config.cookies.iter().collect();
        pairs.sort();
        let cookie = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => warn!("skipping invalid cookie string"),
        }
    }

    headers
}

fn page_with_headers(url: &str, response: &Response) -> Page {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(Page::new(url), |page, (name, value)| page.with_header(name, value))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn open(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.send_checked(url).await?;
        let final_url = response.url().clone();
        let page = page_with_headers(final_url.as_str(), &response);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let (links, forms) = parse_document(&body, &final_url);
        debug!(url = %url, links = links.values().map(Vec::len).sum::<usize>(), "page parsed");

        let page = links
            .into_iter()
            .fold(page, |page, (category, found)| page.with_links(&category, found));
        Ok(forms.into_iter().fold(page, Page::with_form))
    }

    // Any status is accepted: callers are after the headers, which error
    // responses carry too.
    async fn head(&self, url: &str) -> Result<Page, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self
            .client
            .head(parsed)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(page_with_headers(response.url().as_str(), &response))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.send_checked(url).await?;

        let io_error = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let mut file = File::create(dest).await.map_err(io_error)?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
        {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        debug!(url = %url, path = %dest.display(), bytes = written, "download complete");
        Ok(written)
    }
}
