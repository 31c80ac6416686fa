// src/plugin/mod.rs
// =============================================================================
// Plugins: background consumers of the output stream.
//
// A plugin is started by the spider right after the workers. It gets its own
// cursor over the output stream, reads every discovered URL exactly once and
// exits when the stream is finished. Plugins never feed anything back into
// the crawl.
//
// Plugins are looked up by name in a PluginRegistry and configured through a
// single option map shared by every plugin of the run.
//
// Built-in plugins:
// - ServerID:   identifies web servers from the "Server" header
// - FormFinder: lists pages containing forms
// - MassDumper: downloads files matching a set of extensions
// =============================================================================

mod error;
mod form_finder;
mod mass_dumper;
mod server_id;

pub use error::PluginError;
pub use form_finder::FormFinder;
pub use mass_dumper::MassDumper;
pub use server_id::ServerID;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::config::CrawlConfig;
use crate::crawl::OutputCursor;
use crate::fetch::Fetcher;

/// A background task consuming discovered URLs.
#[async_trait]
pub trait Plugin: Send {
    /// Name used in logs and for lookup in the registry.
    fn name(&self) -> &'static str;

    /// Options that must be set before the plugin can be loaded.
    fn required_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Consumes the output stream until it is finished.
    async fn run(self: Box<Self>, ctx: PluginContext) -> Result<(), PluginError>;
}

/// Builds a fresh plugin instance.
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// Everything a running plugin may use.
pub struct PluginContext {
    name: &'static str,
    urls: OutputCursor,
    fetcher: Arc<dyn Fetcher>,
    options: Arc<PluginOptions>,
    config: Arc<CrawlConfig>,
}

impl PluginContext {
    pub fn new(
        name: &'static str,
        urls: OutputCursor,
        fetcher: Arc<dyn Fetcher>,
        options: Arc<PluginOptions>,
        config: Arc<CrawlConfig>,
    ) -> Self {
        Self {
            name,
            urls,
            fetcher,
            options,
            config,
        }
    }

    /// Next discovered URL; `None` once the crawl is over and every URL
    /// has been read.
    pub async fn next_url(&mut self) -> Option<String> {
        self.urls.next().await
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name)
    }

    // Parses an optional numeric (or otherwise FromStr) option
    pub fn option_or<T>(&self, name: &str, default: T) -> Result<T, PluginError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.option(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| PluginError::InvalidOption {
                plugin: self.name.to_string(),
                option: name.to_lowercase(),
                value: value.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Page extensions of the crawl.
    pub fn extensions(&self) -> &[String] {
        &self.config.extensions
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Plugin options. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    values: HashMap<String, String>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `"name=value;name=value"`. Entries without '=' are skipped.
    pub fn parse(input: &str) -> Self {
        let mut options = Self::new();
        for entry in input.split(';') {
            if let Some((name, value)) = entry.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    options.set(name, value.trim());
                }
            }
        }
        options
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Name -> factory lookup for plugins.
pub struct PluginRegistry {
    factories: Vec<(&'static str, PluginFactory)>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// A registry holding ServerID, FormFinder and MassDumper.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ServerID::NAME, || Box::new(ServerID));
        registry.register(FormFinder::NAME, || Box::new(FormFinder));
        registry.register(MassDumper::NAME, || Box::new(MassDumper));
        registry
    }

    /// Registers a factory. A later registration under the same name wins.
    pub fn register(&mut self, name: &'static str, factory: PluginFactory) {
        debug!(plugin = name, "registering plugin");
        self.factories.retain(|(existing, _)| *existing != name);
        self.factories.push((name, factory));
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(name, _)| *name).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<PluginFactory, PluginError> {
        self.factories
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

// Line-oriented report file shared by the plugins that take an "outfile"
pub(crate) struct ReportFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ReportFile {
    pub(crate) async fn create(path: &Path) -> Result<Self, PluginError> {
        let file = File::create(path).await.map_err(|source| PluginError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    // Writes one line and flushes, so the file is usable while the crawl runs
    pub(crate) async fn write_line(&mut self, line: &str) -> Result<(), PluginError> {
        let result = async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        }
        .await;
        result.map_err(|source| PluginError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crawl::AppendLog;
    use crate::fetch::StaticFetcher;
    use crate::Spider;

    // Context whose output stream already holds `urls` and is closed
    pub(crate) fn context_with(
        name: &'static str,
        urls: &[&str],
        fetcher: Arc<dyn Fetcher>,
        options: PluginOptions,
    ) -> PluginContext {
        let log = Arc::new(AppendLog::new());
        for url in urls {
            log.push(url.to_string());
        }
        log.close();

        let config = CrawlConfig::new("http://example.com/").unwrap();
        PluginContext::new(name, log.cursor(), fetcher, Arc::new(options), Arc::new(config))
    }

    #[test]
    fn test_options_parse() {
        let options = PluginOptions::parse(" Exts = .pdf;.doc ; outdir=/tmp/out;junk;=nameless");
        assert_eq!(options.get("exts"), Some(".pdf"));
        assert_eq!(options.get("OUTDIR"), Some("/tmp/out"));
        assert!(!options.contains("junk"));
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_options_value_may_contain_equals() {
        let options = PluginOptions::parse("filter=a=b");
        assert_eq!(options.get("filter"), Some("a=b"));
    }

    #[test]
    fn test_registry_resolves_builtin_names() {
        let registry = PluginRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["ServerID", "FormFinder", "MassDumper"]);

        let plugin = registry.resolve("MassDumper").unwrap()();
        assert_eq!(plugin.required_options(), &["exts", "outdir"]);
        assert!(matches!(
            registry.resolve("Nope"),
            Err(PluginError::Unknown(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_option_or_reports_invalid_values() {
        let mut options = PluginOptions::new();
        options.set("threads", "many");
        let ctx = context_with("Test", &[], Arc::new(StaticFetcher::new()), options);

        assert_eq!(ctx.option_or("max", 100usize).unwrap(), 100);
        assert!(matches!(
            ctx.option_or("threads", 5usize),
            Err(PluginError::InvalidOption { option, .. }) if option == "threads"
        ));
    }

    #[test]
    fn test_load_plugins_requires_options() {
        let registry = PluginRegistry::with_builtin();
        let config = CrawlConfig::new("http://example.com/").unwrap();
        let mut spider = Spider::new(config, Arc::new(StaticFetcher::new()));

        let result = spider.load_plugins(&registry, &["ServerID", "MassDumper"]);
        assert!(matches!(
            result,
            Err(PluginError::MissingOption { plugin, option }) if plugin == "MassDumper" && option == "exts"
        ));
        // All-or-nothing: ServerID was not kept either.
        assert!(spider.loaded_plugins().is_empty());

        spider.set_plugin_option("EXTS", ".pdf");
        spider.set_plugin_option("outdir", "/tmp/dump");
        spider
            .load_plugins(&registry, &["Plugin", "ServerID", "MassDumper"])
            .unwrap();
        assert_eq!(spider.loaded_plugins(), vec!["ServerID", "MassDumper"]);
    }

    #[test]
    fn test_load_unknown_plugin() {
        let registry = PluginRegistry::with_builtin();
        let config = CrawlConfig::new("http://example.com/").unwrap();
        let mut spider = Spider::new(config, Arc::new(StaticFetcher::new()));

        assert!(matches!(
            spider.load_plugins(&registry, &["FormFinder", "Bogus"]),
            Err(PluginError::Unknown(_))
        ));
        assert!(spider.loaded_plugins().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_plugin_runs_alongside_crawl() {
        use crate::fetch::{Form, Page};

        let dir = tempfile::tempdir().unwrap();
        let outfile = dir.path().join("forms.txt");
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_page("http://example.com/", ["http://example.com/login.php"])
                .with_full_page(Page::new("http://example.com/login.php").with_form(Form {
                    action: "http://example.com/login.php".to_string(),
                    method: "post".to_string(),
                    attributes: HashMap::new(),
                })),
        );

        let config = CrawlConfig::new("http://example.com/").unwrap();
        let mut spider = Spider::new(config, fetcher);
        spider.set_plugin_option("outfile", outfile.to_str().unwrap());
        spider
            .load_plugins(&PluginRegistry::with_builtin(), &["FormFinder"])
            .unwrap();

        spider.start().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), spider.join_plugins())
            .await
            .expect("plugin finished");

        let written = std::fs::read_to_string(&outfile).unwrap();
        assert_eq!(written, "http://example.com/login.php\n");
    }
}
