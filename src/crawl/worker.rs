// src/crawl/worker.rs
// =============================================================================
// The crawl worker loop.
//
// Every worker runs the same loop against the shared run state:
// 1. Ask the frontier for the next URL (waiting if a sibling may still add work)
// 2. Fetch the page through the fetch engine
// 3. Feed every extracted link to the frontier and the output stream
// 4. Release the in-flight slot and go again
//
// The frontier answers "finished" only when the queue is empty (or capped)
// and nothing is in flight, so a worker never leaves while a sibling could
// still produce work. A failed fetch is logged and skipped, never retried.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, warn};

use super::spider::CrawlRun;
use crate::fetch::Fetcher;

// Decrements the live-worker count however the worker exits, and closes the
// run's streams when the last one leaves.
struct LiveWorker<'a> {
    run: &'a CrawlRun,
}

impl Drop for LiveWorker<'_> {
    fn drop(&mut self) {
        if self.run.frontier.worker_exited() == 0 {
            self.run.finish();
        }
    }
}

/// Runs one worker until the crawl is finished or stopped.
///
/// The caller must have counted this worker with `workers_started()` before
/// spawning it.
pub(crate) async fn run_worker(run: Arc<CrawlRun>, fetcher: Arc<dyn Fetcher>) {
    let _live = LiveWorker { run: run.as_ref() };
    let mut fetched = 0usize;

    while let Some(lease) = run.frontier.next().await {
        let url = lease.url();
        run.report(format!("Parsing page: {}...", url));

        match fetcher.open(url).await {
            Ok(page) => {
                for link in page.all_links() {
                    if let Err(e) = run.discover(link) {
                        debug!(link = %link, error = %e, "skipping malformed link");
                    }
                }
                fetched += 1;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "fetch failed");
                run.report(format!("Fetch failed for {}: {}", url, e));
            }
        }
        // Dropping the lease here releases the in-flight slot.
    }

    debug!(pages = fetched, "worker exiting");
}
