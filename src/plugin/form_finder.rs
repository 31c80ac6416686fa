// src/plugin/form_finder.rs
// =============================================================================
// FormFinder: lists discovered pages that contain at least one form.
//
// Only URLs that look like pages (their path ends with one of the crawl's
// page extensions) are opened. Each page is fetched again through the fetch
// engine, so this plugin roughly doubles the request count of a crawl.
//
// Options:
// - method:  optional, "get" or "post"; only forms submitted that way count
// - outfile: optional, writes one URL per line
// =============================================================================

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{Plugin, PluginContext, PluginError, ReportFile};

pub struct FormFinder;

impl FormFinder {
    pub const NAME: &'static str = "FormFinder";
}

// Reads and validates the "method" option
fn wanted_method(ctx: &PluginContext) -> Result<Option<String>, PluginError> {
    let Some(value) = ctx.option("method") else {
        return Ok(None);
    };

    let method = value.trim().to_lowercase();
    if method != "get" && method != "post" {
        return Err(PluginError::InvalidOption {
            plugin: FormFinder::NAME.to_string(),
            option: "method".to_string(),
            value: value.to_string(),
            reason: "expected get or post".to_string(),
        });
    }
    Ok(Some(method))
}

// True when the URL's path ends with a page extension
//
// An empty path counts as "/index.html".
fn looks_like_page(url: &str, extensions: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = match parsed.path() {
        "" => "/index.html",
        path => path,
    };
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

#[async_trait]
impl Plugin for FormFinder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(self: Box<Self>, mut ctx: PluginContext) -> Result<(), PluginError> {
        let method = wanted_method(&ctx)?;
        let mut report = match ctx.option("outfile") {
            Some(path) => Some(ReportFile::create(Path::new(path)).await?),
            None => None,
        };

        let mut found = 0usize;

        while let Some(url) = ctx.next_url().await {
            if !looks_like_page(&url, ctx.extensions()) {
                continue;
            }

            let page = match ctx.fetcher().open(&url).await {
                Ok(page) => page,
                Err(e) => {
                    debug!(url = %url, error = %e, "skipping page");
                    continue;
                }
            };

            let matches = match method.as_deref() {
                None => !page.forms().is_empty(),
                Some(wanted) => page.forms().iter().any(|form| form.method == wanted),
            };
            if !matches {
                continue;
            }

            found += 1;
            info!(plugin = Self::NAME, "Form found: {}", url);
            if let Some(file) = report.as_mut() {
                if let Err(e) = file.write_line(&url).await {
                    warn!(plugin = Self::NAME, error = %e, "could not write report line");
                }
            }
        }

        if found > 0 {
            info!(plugin = Self::NAME, "{} URLs with forms located!", found);
        }
        Ok(())
    }
}
