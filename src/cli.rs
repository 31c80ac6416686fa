// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
//
// There are no subcommands: one invocation is one crawl. Every flag maps
// onto a CrawlConfig field or a plugin setting; main.rs does the mapping.
// =============================================================================

use clap::Parser;

use link_spider::config::{DEFAULT_MAX_PAGES, DEFAULT_THREADS};

// All command-line options of a crawl
//
// #[arg(short, long)] gives each field both a "-x" and a "--name" flag
#[derive(Parser, Debug)]
#[command(
    name = "link-spider",
    version,
    about = "A concurrent web spider with background plugins",
    long_about = "link-spider crawls every reachable page of a website with a pool of async workers \
                  and prints each distinct URL it finds. Plugins can run alongside the crawl to \
                  identify servers, locate forms or mass-download files."
)]
pub struct Cli {
    /// Start URL (e.g., https://example.com/)
    #[arg(short, long)]
    pub url: String,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout: u64,

    /// Number of crawl workers
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Maximum number of pages to fetch (the start URL counts)
    #[arg(short, long, default_value_t = DEFAULT_MAX_PAGES, value_parser = parse_max)]
    pub max: usize,

    /// Also write every discovered URL to this file (truncated first)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Cookies sent with every request: "name=value; name2=value2"
    #[arg(short, long)]
    pub cookie: Option<String>,

    /// Follow links to other hosts
    #[arg(short, long)]
    pub external: bool,

    /// Do not print URLs on other hosts
    #[arg(long)]
    pub hide_external: bool,

    /// Skip URLs containing any of these comma-separated keywords
    #[arg(short, long)]
    pub ignore: Option<String>,

    /// HTTP proxy as host:port
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Comma-separated plugins to run (ServerID, FormFinder, MassDumper)
    #[arg(long)]
    pub plugin: Option<String>,

    /// Plugin options: "name=value;name2=value2"
    #[arg(long)]
    pub plugin_options: Option<String>,

    /// Do not print status messages while crawling
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    // Status messages are shown unless --quiet is given or plugins are
    // loaded (plugin findings would drown in them)
    pub fn verbose(&self) -> bool {
        !self.quiet && self.plugin_names().is_empty()
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugin
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// The start URL is always fetched, so a cap below 1 cannot be honoured
fn parse_max(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(max) => Ok(max),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["link-spider", "-u", "http://example.com/"]).unwrap();
        assert_eq!(cli.threads, DEFAULT_THREADS);
        assert_eq!(cli.max, DEFAULT_MAX_PAGES);
        assert_eq!(cli.timeout, 5000);
        assert!(!cli.external);
        assert!(cli.verbose());
    }

    #[test]
    fn test_plugins_force_quiet() {
        let cli = Cli::try_parse_from([
            "link-spider",
            "--url",
            "http://example.com/",
            "--plugin",
            "ServerID, FormFinder,",
        ])
        .unwrap();
        assert_eq!(cli.plugin_names(), vec!["ServerID", "FormFinder"]);
        assert!(!cli.verbose());
    }

    #[test]
    fn test_max_must_be_positive() {
        assert!(Cli::try_parse_from(["link-spider", "-u", "http://example.com/", "-m", "0"]).is_err());
        assert!(Cli::try_parse_from(["link-spider", "-u", "http://example.com/", "-m", "x"]).is_err());

        let cli = Cli::try_parse_from(["link-spider", "-u", "http://example.com/", "-m", "1"]).unwrap();
        assert_eq!(cli.max, 1);
    }

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["link-spider", "-t", "3"]).is_err());
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Option<String> for most flags?
//    - None means "flag not given", which is different from an empty value
//    - main.rs only touches the config when the user actually set something
//
// 2. Why keep the raw strings here?
//    - Parsing cookies, proxies and plugin options lives in the library
//      (config.rs, plugin/mod.rs) so embedding programs get the same rules
// -----------------------------------------------------------------------------
