//! Crawl Engine Module
//!
//! Worker state machine, orchestration, and the error, retry, progress and
//! cleanup plumbing they share.

pub mod cleanup;
pub mod crawl_types;
pub mod orchestrator;
pub mod page_timeout;
pub mod progress;
pub mod retry;
pub mod worker;

pub use cleanup::{CleanupResult, close_browser_and_data, close_sessions_reversed};
pub use crawl_types::{
    CategoryOutcome, CrawlError, CrawlResult, DocumentOutcome, FailureKind, WorkerState,
};
pub use orchestrator::{Orchestrator, StatsBoard, partition};
pub use page_timeout::with_page_timeout;
pub use progress::{LogProgress, NoOpProgress, ProgressReporter};
pub use retry::{backoff_delay, poll_with_backoff, retry_with_backoff};
pub use worker::Worker;
