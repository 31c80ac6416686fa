// src/main.rs
// =============================================================================
// Entry point of the link-spider command line tool.
//
// What happens here:
// 1. Parse command-line arguments and build a CrawlConfig
// 2. Load the requested plugins (fail fast on unknown names / missing options)
// 3. Start the spider and print every discovered URL as it arrives
//    (a failed start still prints what the attempt found)
// 4. Wait for the plugins, then print a summary
//
// Exit codes: 0 = crawl completed, 1 = crawl could not start, 2 = error
// =============================================================================

mod cli;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::warn;

use cli::Cli;
use link_spider::config::{parse_cookies, parse_ignore, parse_proxy};
use link_spider::{CrawlConfig, HttpFetcher, OutputCursor, PluginOptions, PluginRegistry, Spider};

// What one crawl produced, before it is turned into a summary
#[derive(Debug)]
struct CrawlOutcome {
    started: bool,
    urls_found: usize,
    interrupted: bool,
}

// Final report, printed with --json
#[derive(Debug, Serialize)]
struct CrawlSummary {
    start_url: String,
    urls_found: usize,
    pages_crawled: usize,
    elapsed_secs: f64,
    interrupted: bool,
}

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Unexpected failure: print the whole cause chain
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise lifecycle logs only in verbose mode, and plugin
// findings always
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info"
    } else {
        "warn,link_spider::plugin=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Maps the command line onto a CrawlConfig
fn build_config(cli: &Cli) -> Result<CrawlConfig> {
    let mut config = CrawlConfig::new(&cli.url)?
        .with_threads(cli.threads)
        .with_max_pages(cli.max)
        .with_timeout(Duration::from_millis(cli.timeout))
        .with_follow_external(cli.external)
        .with_hide_external(cli.hide_external);

    if let Some(user_agent) = &cli.user_agent {
        config = config.with_user_agent(user_agent);
    }
    if let Some(cookie) = &cli.cookie {
        config = config.with_cookies(parse_cookies(cookie));
    }
    if let Some(ignore) = &cli.ignore {
        config = config.with_ignore(parse_ignore(ignore));
    }
    if let Some(proxy) = &cli.proxy {
        let proxy = parse_proxy(proxy).map_err(anyhow::Error::msg)?;
        config = config.with_proxy(Some(proxy));
    }

    Ok(config)
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let verbose = cli.verbose();
    init_tracing(verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            return Ok(1);
        }
    };

    let fetcher = HttpFetcher::new(&config).context("failed to build HTTP client")?;
    let mut spider = Spider::new(config, std::sync::Arc::new(fetcher));

    if let Some(raw) = &cli.plugin_options {
        for (name, value) in PluginOptions::parse(raw).iter() {
            spider.set_plugin_option(name, value);
        }
    }
    let plugin_names = cli.plugin_names();
    if let Err(e) = spider.load_plugins(&PluginRegistry::with_builtin(), plugin_names.as_slice()) {
        eprintln!("❌ {}", e);
        return Ok(1);
    }

    // The output file must be writable before any network traffic starts
    let output_file = match &cli.output {
        Some(path) => Some(open_output(path).await?),
        None => None,
    };

    println!("🕷️  Spidering: {}", cli.url);
    let started = Instant::now();

    let outcome = crawl(&mut spider, output_file, verbose).await?;

    let summary = CrawlSummary {
        start_url: cli.url.clone(),
        urls_found: outcome.urls_found,
        pages_crawled: spider.crawled().len(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        interrupted: outcome.interrupted,
    };
    print_summary(&summary, cli.json)?;

    Ok(if outcome.started { 0 } else { 1 })
}

// Truncates any previous crawl's output
async fn open_output(path: &str) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .await
        .with_context(|| format!("failed to open output file {}", path))?;
    Ok(BufWriter::new(file))
}

// Starts the spider and prints its output until the stream is final
//
// A start that fails still leaves the attempt's output stream readable and
// closed, so whatever the start URL yielded is printed all the same.
async fn crawl(
    spider: &mut Spider,
    output_file: Option<BufWriter<File>>,
    verbose: bool,
) -> Result<CrawlOutcome> {
    let started = match spider.start().await {
        Ok(()) => true,
        Err(e) => {
            eprintln!("❌ {}", e);
            false
        }
    };

    let status_printer = match spider.status() {
        Some(mut status) if verbose => Some(tokio::spawn(async move {
            while let Some(message) = status.next().await {
                eprintln!("[*] {}", message);
            }
        })),
        _ => None,
    };

    let urls = spider.output().context("spider has no output stream")?;
    let drain = print_urls(urls, output_file);
    tokio::pin!(drain);

    let drained = tokio::select! {
        result = &mut drain => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let (urls_found, interrupted) = match drained {
        Some(found) => (found, false),
        None => {
            eprintln!("⚠️  Interrupted, stopping workers...");
            spider.kill().await;
            (drain.await?, true)
        }
    };

    if let Some(printer) = status_printer {
        if let Err(e) = printer.await {
            warn!(error = %e, "status printer aborted");
        }
    }
    spider.join_plugins().await;

    Ok(CrawlOutcome {
        started,
        urls_found,
        interrupted,
    })
}

// Prints each URL as it is yielded and mirrors it to the output file
//
// Every line is flushed as it is written. Returns once the output stream is
// finished.
async fn print_urls(mut urls: OutputCursor, mut file: Option<BufWriter<File>>) -> Result<usize> {
    let mut found = 0;

    while let Some(url) = urls.next().await {
        println!("🔗 {}", url);
        if let Some(writer) = file.as_mut() {
            writer
                .write_all(format!("{}\n", url).as_bytes())
                .await
                .context("failed to write output file")?;
            writer.flush().await.context("failed to flush output file")?;
        }
        found += 1;
    }

    Ok(found)
}

fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    println!("   🔗 URLs found: {}", summary.urls_found);
    println!("   📄 Pages crawled: {}", summary.pages_crawled);
    println!("   ⏱️  Time: {:.3}s", summary.elapsed_secs);
    if summary.interrupted {
        println!("   ⚠️  Crawl was interrupted");
    }
    Ok(())
}
