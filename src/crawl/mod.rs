// src/crawl/mod.rs
// =============================================================================
// The crawl engine.
//
// Pieces:
// - policy:   which URLs may be fetched, which may be yielded
// - frontier: queue + visited set + in-flight count under one lock
// - stream:   append-only output and status streams with per-reader cursors
// - worker:   the fetch / extract / enqueue loop run by every worker task
// - spider:   the controller tying it together (start, kill, plugins)
//
// Everything a run needs lives in one shared CrawlRun. Workers and plugins
// are plain tokio tasks holding an Arc to it.
// =============================================================================

mod error;
mod frontier;
mod policy;
mod spider;
mod stream;
mod worker;

pub use error::CrawlError;
pub use frontier::{Dispatch, Frontier, Lease};
pub use policy::{admit_to_frontier, admit_to_output, is_ignored, is_internal, strip_fragment};
pub use spider::{Spider, SpiderState};
pub use stream::{AppendLog, Cursor, OutputCursor, OutputStream, ReadNext, StatusCursor};
