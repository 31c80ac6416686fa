// src/plugin/server_id.rs
// =============================================================================
// ServerID: identifies web servers from their "Server" response header.
//
// For every discovered URL the plugin sends one HEAD request to the root of
// its host (scheme://host[:port]/). Each host is probed once; a host whose
// probe failed at the network level is retried when it shows up again.
//
// Options:
// - outfile: optional, writes "HOST<TAB>SERVER" lines
// =============================================================================

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{Plugin, PluginContext, PluginError, ReportFile};

pub struct ServerID;

impl ServerID {
    pub const NAME: &'static str = "ServerID";
}

// "host[:port]" and the root URL to probe, or None for host-less URLs
fn probe_target(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let root = format!("{}://{}/", parsed.scheme(), host);
    Some((host, root))
}

#[async_trait]
impl Plugin for ServerID {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(self: Box<Self>, mut ctx: PluginContext) -> Result<(), PluginError> {
        let mut report = match ctx.option("outfile") {
            Some(path) => {
                let mut file = ReportFile::create(Path::new(path)).await?;
                file.write_line("HOST\tSERVER").await?;
                Some(file)
            }
            None => None,
        };

        let mut probed = HashSet::new();
        let mut identified = 0usize;

        while let Some(url) = ctx.next_url().await {
            let Some((host, root)) = probe_target(&url) else {
                continue;
            };
            if probed.contains(&host) {
                continue;
            }

            let head = match ctx.fetcher().head(&root).await {
                Ok(head) => head,
                Err(e) => {
                    debug!(host = %host, error = %e, "probe failed");
                    continue;
                }
            };
            probed.insert(host.clone());

            let Some(server) = head.header("server").map(str::trim) else {
                error!(plugin = Self::NAME, "Error identifying host: {}", host);
                continue;
            };

            info!(plugin = Self::NAME, "Host: {}  Server: {}", host, server);
            identified += 1;
            if let Some(file) = report.as_mut() {
                if let Err(e) = file.write_line(&format!("{}\t{}", host, server)).await {
                    warn!(plugin = Self::NAME, error = %e, "could not write report line");
                }
            }
        }

        debug!(hosts = identified, "server identification finished");
        Ok(())
    }
}
