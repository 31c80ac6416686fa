// src/crawl/frontier.rs
// =============================================================================
// The frontier and visited store.
//
// One mutex guards everything workers coordinate on:
// - the FIFO queue of URLs waiting to be fetched
// - the visited list (URLs already handed to a worker)
// - the in-flight counter (workers between dispatch and link extraction)
// - the live-worker counter and the stop flag
//
// Every read-modify-write happens inside a single critical section. In
// particular "pop a URL, mark it visited, bump in-flight" is one step, so no
// worker can observe an empty queue with zero in-flight while a sibling is
// between popping and announcing its work.
//
// Waiting is done with tokio's Notify (for new work) and a watch channel
// (for the live-worker count) instead of sleep loops.
// =============================================================================

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::trace;

use crate::config::CrawlConfig;
use crate::crawl::policy::admit_to_frontier;

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: Vec<String>,
    visited_set: HashSet<String>,
    in_flight: usize,
    live_workers: usize,
    stopped: bool,
}

impl FrontierState {
    fn cap_reached(&self, max_pages: usize) -> bool {
        self.visited.len() >= max_pages
    }
}

/// Outcome of a single dispatch attempt.
pub enum Dispatch<'a> {
    /// A URL was popped, marked visited and counted as in flight.
    Url(Lease<'a>),
    /// Nothing available right now, but an in-flight sibling may still add work.
    Wait,
    /// Queue exhausted (or capped) with nothing in flight, or the run was stopped.
    Finished,
}

/// A dispatched URL. Dropping the lease releases its in-flight slot.
pub struct Lease<'a> {
    frontier: &'a Frontier,
    url: String,
}

impl Lease<'_> {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.frontier.release();
    }
}

/// Shared pending-queue and visited bookkeeping for one run.
pub struct Frontier {
    config: Arc<CrawlConfig>,
    state: Mutex<FrontierState>,
    work: Notify,
    live: watch::Sender<usize>,
}

impl Frontier {
    pub fn new(config: Arc<CrawlConfig>) -> Self {
        let (live, _) = watch::channel(0);
        Self {
            config,
            state: Mutex::new(FrontierState::default()),
            work: Notify::new(),
            live,
        }
    }

    /// Queues `url` for fetching if policy, dedupe and the page cap allow it.
    ///
    /// Returns `Ok(true)` when the URL was added, `Ok(false)` when it was
    /// silently refused, and `Err` when it does not parse.
    pub fn enqueue(&self, url: &str) -> Result<bool, url::ParseError> {
        if !admit_to_frontier(url, &self.config)? {
            return Ok(false);
        }

        let added = {
            let mut state = self.state.lock();
            let fresh = !state.queued.contains(url) && !state.visited_set.contains(url);
            if fresh && !state.cap_reached(self.config.max_pages) {
                state.queue.push_back(url.to_string());
                state.queued.insert(url.to_string());
                true
            } else {
                false
            }
        };

        if added {
            trace!(url = %url, "queued");
            self.work.notify_waiters();
        }
        Ok(added)
    }

    // Records a URL fetched outside the worker pool (the seed page)
    pub(crate) fn mark_visited(&self, url: &str) {
        let mut state = self.state.lock();
        if state.visited_set.insert(url.to_string()) {
            state.visited.push(url.to_string());
        }
    }

    /// Pops the oldest queued URL, if the cap allows, in the same critical
    /// section that marks it visited and counts it as in flight.
    pub fn try_dispatch(&self) -> Dispatch<'_> {
        let mut state = self.state.lock();

        if state.stopped {
            return Dispatch::Finished;
        }

        if !state.cap_reached(self.config.max_pages) {
            if let Some(url) = state.queue.pop_front() {
                state.queued.remove(&url);
                state.visited_set.insert(url.clone());
                state.visited.push(url.clone());
                state.in_flight += 1;
                return Dispatch::Url(Lease {
                    frontier: self,
                    url,
                });
            }
        }

        if state.in_flight == 0 {
            Dispatch::Finished
        } else {
            Dispatch::Wait
        }
    }

    /// Waits for the next URL to fetch.
    ///
    /// Returns `None` once the crawl is globally finished or stopped. An empty
    /// queue alone never ends the wait while a sibling still holds a lease.
    pub async fn next(&self) -> Option<Lease<'_>> {
        loop {
            // Register interest before looking, so a notify between the
            // check and the await is not lost.
            let notified = self.work.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_dispatch() {
                Dispatch::Url(lease) => return Some(lease),
                Dispatch::Finished => return None,
                Dispatch::Wait => notified.await,
            }
        }
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.work.notify_waiters();
    }

    // Counts a whole pool at once, so no early exit can see a partial count
    pub(crate) fn workers_started(&self, count: usize) {
        let mut state = self.state.lock();
        state.live_workers += count;
        self.live.send_replace(state.live_workers);
    }

    // Returns how many workers are still live after this one left
    pub(crate) fn worker_exited(&self) -> usize {
        let remaining = {
            let mut state = self.state.lock();
            state.live_workers = state.live_workers.saturating_sub(1);
            self.live.send_replace(state.live_workers);
            state.live_workers
        };
        // A leaving worker may have been the last one able to refill the queue.
        self.work.notify_waiters();
        remaining
    }

    /// Raises the stop flag and wakes every waiting worker.
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.work.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Resolves once no worker is live.
    pub async fn wait_for_workers(&self) {
        let mut live = self.live.subscribe();
        // The sender lives as long as self, so this cannot fail.
        let _ = live.wait_for(|count| *count == 0).await;
    }

    pub fn live_workers(&self) -> usize {
        self.state.lock().live_workers
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.state.lock().visited.len()
    }

    /// URLs dispatched so far, in dispatch order.
    pub fn visited(&self) -> Vec<String> {
        self.state.lock().visited.clone()
    }
}
