// src/crawl/stream.rs
// =============================================================================
// Append-only streams read through independent cursors.
//
// The spider publishes two streams:
// - the output stream: every distinct URL discovered, in acceptance order
// - the status stream: human-readable progress messages
//
// Nothing is ever removed from a stream. Each consumer (the invoking program,
// every plugin) owns a Cursor holding its own read offset, so any number of
// readers can walk the same entries without interfering with each other.
//
// A cursor that has caught up waits on a Notify until either a new entry is
// appended or the stream is closed. Closing happens when the producer side
// (the worker pool) is gone; after that a caught-up cursor reports Done.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::CrawlConfig;
use crate::crawl::policy::{admit_to_output, is_ignored, strip_fragment};

#[derive(Debug)]
struct LogState<T> {
    entries: Vec<T>,
    closed: bool,
}

/// An append-only sequence with any number of independent readers.
#[derive(Debug)]
pub struct AppendLog<T> {
    state: Mutex<LogState<T>>,
    appended: Notify,
}

/// Result of a non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadNext<T> {
    Item(T),
    /// Caught up, but the producer is still running.
    Pending,
    /// Caught up and the producer has finished.
    Done,
}

impl<T: Clone> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: Vec::new(),
                closed: false,
            }),
            appended: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.state.lock().entries.push(item);
        self.appended.notify_waiters();
    }

    /// Marks the producer side as finished and wakes every waiting cursor.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.appended.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry appended so far.
    pub fn snapshot(&self) -> Vec<T> {
        self.state.lock().entries.clone()
    }

    /// A new reader positioned at the first entry.
    pub fn cursor(self: &Arc<Self>) -> Cursor<T> {
        Cursor {
            log: Arc::clone(self),
            offset: 0,
        }
    }

    fn read_at(&self, offset: usize) -> ReadNext<T> {
        let state = self.state.lock();
        match state.entries.get(offset) {
            Some(item) => ReadNext::Item(item.clone()),
            None if state.closed => ReadNext::Done,
            None => ReadNext::Pending,
        }
    }
}

impl<T: Clone> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer-local read position into an [`AppendLog`].
#[derive(Debug)]
pub struct Cursor<T> {
    log: Arc<AppendLog<T>>,
    offset: usize,
}

impl<T: Clone> Cursor<T> {
    /// Reads the next entry without waiting.
    pub fn try_next(&mut self) -> ReadNext<T> {
        let read = self.log.read_at(self.offset);
        if matches!(read, ReadNext::Item(_)) {
            self.offset += 1;
        }
        read
    }

    /// Waits for the next entry; `None` once the stream is closed and drained.
    pub async fn next(&mut self) -> Option<T> {
        // A separate handle to the log, so the pending notification does
        // not borrow the cursor that try_next() advances.
        let log = Arc::clone(&self.log);
        loop {
            let notified = log.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_next() {
                ReadNext::Item(item) => return Some(item),
                ReadNext::Done => return None,
                ReadNext::Pending => notified.await,
            }
        }
    }

    /// Number of entries this cursor has consumed.
    pub fn position(&self) -> usize {
        self.offset
    }
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            offset: self.offset,
        }
    }
}

pub type OutputCursor = Cursor<String>;
pub type StatusCursor = Cursor<String>;

/// The deduplicating stream of discovered URLs.
///
/// The yielded-set check and the append share one lock, so two workers
/// yielding the same URL at the same time cannot both append it.
pub struct OutputStream {
    config: Arc<CrawlConfig>,
    yielded: Mutex<HashSet<String>>,
    log: Arc<AppendLog<String>>,
}

impl OutputStream {
    pub fn new(config: Arc<CrawlConfig>) -> Self {
        Self {
            config,
            yielded: Mutex::new(HashSet::new()),
            log: Arc::new(AppendLog::new()),
        }
    }

    /// Appends `url` unless it is hidden by policy, matches an ignore
    /// keyword, or was yielded before. Returns whether it was appended.
    pub fn offer(&self, url: &str) -> bool {
        let url = strip_fragment(url);
        if !admit_to_output(url, &self.config) || is_ignored(url, &self.config) {
            return false;
        }

        let mut yielded = self.yielded.lock();
        if !yielded.insert(url.to_string()) {
            return false;
        }
        // Appending while still holding the yielded lock keeps stream order
        // identical to acceptance order.
        self.log.push(url.to_string());
        true
    }

    pub fn cursor(&self) -> OutputCursor {
        self.log.cursor()
    }

    pub fn close(&self) {
        self.log.close();
    }

    /// Number of distinct URLs yielded.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.log.snapshot()
    }
}
