// src/crawl/spider.rs
// =============================================================================
// The crawl controller.
//
// Lifecycle: Idle -> Bootstrapping -> Active -> (Draining) -> Stopped
//
// - start() builds fresh run state, fetches the start URL itself to seed the
//   frontier and the output stream, then spawns the workers and, after them,
//   one task per loaded plugin.
// - The run is Active while at least one worker is live. When the last worker
//   leaves, both streams are closed so every cursor can tell the output is
//   final.
// - kill() raises the stop flag and waits for the workers to leave. It is a
//   hard interrupt: discoveries of pages still in flight may be lost.
//
// Each run gets its own CrawlRun behind an Arc. Calling start() again simply
// replaces it, so nothing from a previous run leaks into the next one.
// =============================================================================

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use super::frontier::Frontier;
use super::policy::strip_fragment;
use super::stream::{AppendLog, OutputCursor, OutputStream, StatusCursor};
use super::worker::run_worker;
use super::CrawlError;
use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::plugin::{Plugin, PluginContext, PluginError, PluginOptions, PluginRegistry};

/// Where the spider is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiderState {
    /// Never started, or the last start() failed.
    Idle,
    /// Fetching the start URL.
    Bootstrapping,
    /// Workers are running.
    Active,
    /// kill() was called and workers are still leaving.
    Draining,
    /// Every worker has exited.
    Stopped,
}

// State shared by the controller, the workers and the stream readers of one run
pub(crate) struct CrawlRun {
    pub(crate) config: Arc<CrawlConfig>,
    pub(crate) frontier: Frontier,
    pub(crate) output: OutputStream,
    pub(crate) status: Arc<AppendLog<String>>,
    phase: Mutex<SpiderState>,
}

impl CrawlRun {
    fn new(config: Arc<CrawlConfig>) -> Self {
        Self {
            frontier: Frontier::new(Arc::clone(&config)),
            output: OutputStream::new(Arc::clone(&config)),
            status: Arc::new(AppendLog::new()),
            phase: Mutex::new(SpiderState::Bootstrapping),
            config,
        }
    }

    // Offers one raw link to the frontier, then to the output stream
    //
    // A link that does not parse is reported to the caller and goes nowhere.
    pub(crate) fn discover(&self, link: &str) -> Result<(), url::ParseError> {
        let link = strip_fragment(link);
        self.frontier.enqueue(link)?;
        self.output.offer(link);
        Ok(())
    }

    pub(crate) fn report(&self, message: String) {
        self.status.push(message);
    }

    // Closes both streams: nothing more will be produced by this run
    pub(crate) fn finish(&self) {
        self.output.close();
        self.status.close();
    }

    fn set_phase(&self, phase: SpiderState) {
        *self.phase.lock() = phase;
    }

    fn state(&self) -> SpiderState {
        match *self.phase.lock() {
            SpiderState::Active if self.frontier.live_workers() == 0 => SpiderState::Stopped,
            SpiderState::Active if self.frontier.is_stopped() => SpiderState::Draining,
            phase => phase,
        }
    }
}

type PluginTask = (&'static str, JoinHandle<Result<(), PluginError>>);

/// The crawl controller.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use link_spider::{CrawlConfig, HttpFetcher, Spider};
///
/// let config = CrawlConfig::new("https://example.com/")?.with_threads(4);
/// let fetcher = Arc::new(HttpFetcher::new(&config)?);
/// let mut spider = Spider::new(config, fetcher);
///
/// spider.start().await?;
/// if let Some(mut urls) = spider.output() {
///     while let Some(url) = urls.next().await {
///         println!("{}", url);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Spider {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    plugin_options: PluginOptions,
    plugins: Vec<Box<dyn Plugin>>,
    run: Option<Arc<CrawlRun>>,
    plugin_tasks: Vec<PluginTask>,
}

impl Spider {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            plugin_options: PluginOptions::default(),
            plugins: Vec::new(),
            run: None,
            plugin_tasks: Vec::new(),
        }
    }

    /// Configuration used by the next start().
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Page extensions in use.
    pub fn extensions(&self) -> &[String] {
        &self.config.extensions
    }

    pub fn add_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.add_extensions(extensions);
    }

    /// The fetch engine shared by workers and plugins.
    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Sets a plugin option. Names are case-insensitive and shared by every
    /// plugin, so two plugins using the same name see the same value.
    pub fn set_plugin_option(&mut self, name: &str, value: &str) {
        self.plugin_options.set(name, value);
    }

    pub fn plugin_options(&self) -> &PluginOptions {
        &self.plugin_options
    }

    /// Names of the plugins that will run on the next start().
    pub fn loaded_plugins(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Resolves and validates plugins by name.
    ///
    /// All-or-nothing: an unknown name or a missing required option leaves
    /// the loaded set untouched. Options must be set before calling this.
    pub fn load_plugins<S: AsRef<str>>(
        &mut self,
        registry: &PluginRegistry,
        names: &[S],
    ) -> Result<(), PluginError> {
        let mut loaded = Vec::new();

        for name in names {
            let name = name.as_ref().trim();
            // "Plugin" is the abstract base, not something to run.
            if name.is_empty() || name == "Plugin" {
                continue;
            }

            let factory = registry.resolve(name)?;
            let plugin = factory();

            for option in plugin.required_options() {
                if !self.plugin_options.contains(option) {
                    return Err(PluginError::MissingOption {
                        plugin: name.to_string(),
                        option: option.to_lowercase(),
                    });
                }
            }

            info!(plugin = name, "plugin loaded");
            loaded.push(plugin);
        }

        self.plugins.extend(loaded);
        Ok(())
    }

    /// Seeds the crawl from the start URL and launches the workers.
    ///
    /// Fails when the start URL cannot be fetched or yields nothing to
    /// crawl. Even then the output stream of the attempt stays readable
    /// (and already closed) through [`Spider::output`].
    pub async fn start(&mut self) -> Result<(), CrawlError> {
        if self.is_active() {
            return Err(CrawlError::AlreadyRunning);
        }

        let config = Arc::new(self.config.clone());
        let run = Arc::new(CrawlRun::new(Arc::clone(&config)));
        self.run = Some(Arc::clone(&run));
        self.plugin_tasks.clear();

        let seed = strip_fragment(config.start_url.as_str()).to_string();
        info!(url = %seed, "parsing base URL");

        let page = match self.fetcher.open(&seed).await {
            Ok(page) => page,
            Err(source) => {
                warn!(url = %seed, error = %source, "start URL could not be fetched");
                self.abort_start(&run);
                return Err(CrawlError::SeedFetch { url: seed, source });
            }
        };

        run.frontier.mark_visited(&seed);
        run.output.offer(&seed);

        for link in page.links_in("href") {
            if run.discover(link).is_err() {
                run.report(format!("Malformed URL: {}", link));
            }
        }

        if run.frontier.pending() == 0 {
            warn!(url = %seed, "no URL to spider");
            self.abort_start(&run);
            return Err(CrawlError::NothingToCrawl(seed));
        }

        info!(threads = config.threads, "starting workers");
        run.frontier.workers_started(config.threads);
        run.set_phase(SpiderState::Active);
        for id in 0..config.threads {
            tokio::spawn(
                run_worker(Arc::clone(&run), Arc::clone(&self.fetcher))
                    .instrument(info_span!("worker", id)),
            );
        }

        if !self.plugins.is_empty() {
            self.start_plugins(&run);
        }

        Ok(())
    }

    // Each plugin runs once per start; they are consumed here
    fn start_plugins(&mut self, run: &Arc<CrawlRun>) {
        let options = Arc::new(self.plugin_options.clone());

        for plugin in self.plugins.drain(..) {
            let name = plugin.name();
            let ctx = PluginContext::new(
                name,
                run.output.cursor(),
                Arc::clone(&self.fetcher),
                Arc::clone(&options),
                Arc::clone(&run.config),
            );

            info!(plugin = name, "starting plugin");
            let handle = tokio::spawn(plugin.run(ctx).instrument(info_span!("plugin", name)));
            self.plugin_tasks.push((name, handle));
        }
    }

    fn abort_start(&self, run: &CrawlRun) {
        run.set_phase(SpiderState::Idle);
        run.finish();
    }

    /// True while the run was started, not killed, and a worker is live.
    pub fn is_active(&self) -> bool {
        self.state() == SpiderState::Active
    }

    pub fn state(&self) -> SpiderState {
        self.run
            .as_ref()
            .map(|run| run.state())
            .unwrap_or(SpiderState::Idle)
    }

    /// Stops the workers and waits until every one of them has exited.
    pub async fn kill(&self) {
        if let Some(run) = &self.run {
            info!("stopping spider");
            run.frontier.stop();
            run.frontier.wait_for_workers().await;
        }
    }

    /// A new cursor over the current run's output stream.
    pub fn output(&self) -> Option<OutputCursor> {
        self.run.as_ref().map(|run| run.output.cursor())
    }

    /// A new cursor over the current run's status messages.
    pub fn status(&self) -> Option<StatusCursor> {
        self.run.as_ref().map(|run| run.status.cursor())
    }

    /// Distinct URLs yielded so far.
    pub fn url_count(&self) -> usize {
        self.run.as_ref().map(|run| run.output.len()).unwrap_or(0)
    }

    /// URLs dispatched for fetching (seed included), in dispatch order.
    pub fn crawled(&self) -> Vec<String> {
        self.run
            .as_ref()
            .map(|run| run.frontier.visited())
            .unwrap_or_default()
    }

    /// Waits for every plugin task of the current run to finish.
    pub async fn join_plugins(&mut self) {
        let (names, handles): (Vec<_>, Vec<_>) = self.plugin_tasks.drain(..).unzip();

        for (name, outcome) in names.into_iter().zip(join_all(handles).await) {
            match outcome {
                Ok(Ok(())) => info!(plugin = name, "plugin finished"),
                Ok(Err(e)) => warn!(plugin = name, error = %e, "plugin failed"),
                Err(e) => warn!(plugin = name, error = %e, "plugin task aborted"),
            }
        }
    }
}
