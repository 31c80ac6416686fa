// src/plugin/mass_dumper.rs
// =============================================================================
// MassDumper: downloads every discovered file with a wanted extension.
//
// The URL path is mirrored under the output directory:
//   http://example.com/docs/a.pdf   ->  <outdir>/docs/a.pdf
//   http://example.com/docs/        ->  <outdir>/docs/index.html
//   http://example.com/docs         ->  <outdir>/docs/index.html
//
// "." and ".." segments are resolved first, so nothing is ever written
// outside the output directory. Files that already exist are skipped.
//
// Options:
// - exts:    required, ';'-separated suffixes ("*" matches everything)
// - outdir:  required, target directory
// - threads: optional, concurrent downloads (default 5)
// - max:     optional, stop after this many successful downloads (default 100)
// =============================================================================

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::{Plugin, PluginContext, PluginError};
use crate::fetch::FetchError;

const DEFAULT_THREADS: usize = 5;
const DEFAULT_MAX_FILES: usize = 100;

pub struct MassDumper;

impl MassDumper {
    pub const NAME: &'static str = "MassDumper";
}

/// Maps a URL path to a file under `outdir`.
pub fn local_path(outdir: &Path, url_path: &str) -> PathBuf {
    let mut segments: Vec<&str> = Vec::new();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let is_directory = url_path.ends_with('/')
        || url_path.ends_with("/.")
        || url_path.ends_with("/..")
        || segments.last().map_or(true, |last| !last.contains('.'));

    let mut path = outdir.to_path_buf();
    path.extend(segments);
    if is_directory {
        path.push("index.html");
    }
    path
}

// True when the path ends with one of the wanted suffixes
fn wanted(path: &Path, exts: &[String]) -> bool {
    let path = path.to_string_lossy();
    exts.iter().any(|ext| ext == "*" || path.ends_with(ext.as_str()))
}

fn parse_exts(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

type Download = (String, PathBuf, Result<u64, FetchError>);

#[async_trait]
impl Plugin for MassDumper {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required_options(&self) -> &'static [&'static str] {
        &["exts", "outdir"]
    }

    async fn run(self: Box<Self>, mut ctx: PluginContext) -> Result<(), PluginError> {
        let exts = parse_exts(ctx.option("exts").unwrap_or_default());
        let outdir = PathBuf::from(ctx.option("outdir").unwrap_or("."));
        let threads = ctx.option_or("threads", DEFAULT_THREADS)?.max(1);
        let max_files = ctx.option_or("max", DEFAULT_MAX_FILES)?;

        let mut claimed = HashSet::new();
        let mut downloads: JoinSet<Download> = JoinSet::new();
        let mut downloaded = 0usize;

        loop {
            // Never have more in flight than could still be needed.
            while downloads.len() >= threads || downloaded + downloads.len() >= max_files {
                match downloads.join_next().await {
                    Some(finished) => downloaded += record(finished),
                    None => break,
                }
            }
            if downloaded >= max_files {
                break;
            }

            let Some(url) = ctx.next_url().await else {
                break;
            };
            let Ok(parsed) = Url::parse(&url) else {
                continue;
            };

            let dest = local_path(&outdir, parsed.path());
            if !wanted(&dest, &exts) || claimed.contains(&dest) {
                continue;
            }
            if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                debug!(path = %dest.display(), "already downloaded");
                continue;
            }
            claimed.insert(dest.clone());

            let fetcher = ctx.fetcher().clone();
            downloads.spawn(async move {
                let result = fetcher.download(&url, &dest).await;
                (url, dest, result)
            });
        }

        while let Some(finished) = downloads.join_next().await {
            downloaded += record(finished);
        }

        info!(plugin = Self::NAME, "{} files downloaded successfully!", downloaded);
        Ok(())
    }
}

// Logs one finished download; returns 1 on success
fn record(finished: Result<Download, tokio::task::JoinError>) -> usize {
    match finished {
        Ok((url, dest, Ok(bytes))) => {
            info!(plugin = MassDumper::NAME, bytes, "Downloaded: {} -> {}", url, dest.display());
            1
        }
        Ok((url, _, Err(e))) => {
            warn!(plugin = MassDumper::NAME, url = %url, error = %e, "download failed");
            0
        }
        Err(e) => {
            warn!(plugin = MassDumper::NAME, error = %e, "download task aborted");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::plugin::tests::context_with;
    use crate::plugin::PluginOptions;
    use std::sync::Arc;

    #[test]
    fn test_local_path_mapping() {
        let out = Path::new("/dump");
        assert_eq!(local_path(out, "/docs/a.pdf"), Path::new("/dump/docs/a.pdf"));
        assert_eq!(local_path(out, "/docs/"), Path::new("/dump/docs/index.html"));
        assert_eq!(local_path(out, "/docs"), Path::new("/dump/docs/index.html"));
        assert_eq!(local_path(out, ""), Path::new("/dump/index.html"));
        assert_eq!(local_path(out, "/"), Path::new("/dump/index.html"));
    }

    #[test]
    fn test_local_path_never_escapes_outdir() {
        let out = Path::new("/dump");
        assert_eq!(local_path(out, "/../../etc/passwd.txt"), Path::new("/dump/etc/passwd.txt"));
        assert_eq!(local_path(out, "/a/./b/../c.zip"), Path::new("/dump/a/c.zip"));
        assert_eq!(local_path(out, "/a/.."), Path::new("/dump/index.html"));
    }

    #[test]
    fn test_wanted_extensions() {
        let exts = parse_exts(".pdf; .doc;;");
        assert_eq!(exts, vec![".pdf", ".doc"]);
        assert!(wanted(Path::new("/dump/a.pdf"), &exts));
        assert!(!wanted(Path::new("/dump/index.html"), &exts));
        assert!(wanted(Path::new("/dump/index.html"), &["*".to_string()]));
    }

    fn options(outdir: &Path, exts: &str) -> PluginOptions {
        let mut options = PluginOptions::new();
        options.set("outdir", outdir.to_str().unwrap());
        options.set("exts", exts);
        options
    }

    #[tokio::test]
    async fn test_downloads_matching_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_file("http://example.com/docs/a.pdf", b"A".to_vec())
                .with_file("http://example.com/docs/a.pdf?v=2", b"A2".to_vec())
                .with_file("http://example.com/b.pdf", b"B".to_vec())
                .with_file("http://example.com/c.zip", b"C".to_vec()),
        );
        std::fs::write(dir.path().join("b.pdf"), b"old").unwrap();

        let ctx = context_with(
            MassDumper::NAME,
            &[
                "http://example.com/docs/a.pdf",
                "http://example.com/docs/a.pdf?v=2",
                "http://example.com/b.pdf",
                "http://example.com/c.zip",
                "http://example.com/missing.pdf",
            ],
            fetcher,
            options(dir.path(), ".pdf"),
        );
        Box::new(MassDumper).run(ctx).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("docs/a.pdf")).unwrap(), b"A");
        // Existing files are left alone.
        assert_eq!(std::fs::read(dir.path().join("b.pdf")).unwrap(), b"old");
        assert!(!dir.path().join("c.zip").exists());
        assert!(!dir.path().join("missing.pdf").exists());
    }

    #[tokio::test]
    async fn test_stops_after_max_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..10).map(|n| format!("http://example.com/{}.pdf", n)).collect();
        let fetcher = urls
            .iter()
            .fold(StaticFetcher::new(), |f, url| f.with_file(url, b"x".to_vec()));
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let mut options = options(dir.path(), "*");
        options.set("max", "3");
        options.set("threads", "2");
        let ctx = context_with(MassDumper::NAME, &url_refs, Arc::new(fetcher), options);
        Box::new(MassDumper).run(ctx).await.unwrap();

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 3);
    }

    #[tokio::test]
    async fn test_invalid_threads_option() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path(), ".pdf");
        options.set("threads", "lots");
        let ctx = context_with(MassDumper::NAME, &[], Arc::new(StaticFetcher::new()), options);

        assert!(matches!(
            Box::new(MassDumper).run(ctx).await,
            Err(PluginError::InvalidOption { option, .. }) if option == "threads"
        ));
    }
}
