//! Progress reporting for crawl runs
//!
//! Defines the `ProgressReporter` trait for lifecycle event reporting
//! and provides a no-op and a logging implementation.

use log::info;

use crate::models::CrawlSummary;

/// Trait for reporting crawl progress at key lifecycle events
///
/// Called from the orchestrator and from every worker task, so
/// implementations must be cheap and thread-safe.
pub trait ProgressReporter: Send + Sync {
    /// Login and vehicle selection started
    fn report_initializing(&self);

    /// Shared session exported; workers are being spawned
    fn report_session_ready(&self);

    /// A worker reached its crawling state
    fn report_worker_ready(&self, worker_id: usize);

    /// Top-level categories discovered and partitioned
    fn report_categories_discovered(&self, count: usize);

    /// A category finished on one worker
    fn report_category_crawled(&self, worker_id: usize, category_name: &str, documents: usize);

    /// Cleanup has started
    fn report_cleanup_started(&self);

    /// The crawl has finished
    fn report_completed(&self, summary: &CrawlSummary);

    /// An error that did not abort the crawl
    fn report_error(&self, error: &str);
}

/// Progress reporter that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_initializing(&self) {}

    #[inline(always)]
    fn report_session_ready(&self) {}

    #[inline(always)]
    fn report_worker_ready(&self, _worker_id: usize) {}

    #[inline(always)]
    fn report_categories_discovered(&self, _count: usize) {}

    #[inline(always)]
    fn report_category_crawled(&self, _worker_id: usize, _category_name: &str, _documents: usize) {}

    #[inline(always)]
    fn report_cleanup_started(&self) {}

    #[inline(always)]
    fn report_completed(&self, _summary: &CrawlSummary) {}

    #[inline(always)]
    fn report_error(&self, _error: &str) {}
}

/// Reports lifecycle events as `info` log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report_initializing(&self) {
        info!(target: "elsa_crawl::progress", "Initializing crawl session");
    }

    fn report_session_ready(&self) {
        info!(target: "elsa_crawl::progress", "Session ready, spawning workers");
    }

    fn report_worker_ready(&self, worker_id: usize) {
        info!(target: "elsa_crawl::progress", "[worker {worker_id}] ready");
    }

    fn report_categories_discovered(&self, count: usize) {
        info!(target: "elsa_crawl::progress", "Discovered {count} top-level categories");
    }

    fn report_category_crawled(&self, worker_id: usize, category_name: &str, documents: usize) {
        info!(
            target: "elsa_crawl::progress",
            "[worker {worker_id}] {category_name}: {documents} documents"
        );
    }

    fn report_cleanup_started(&self) {
        info!(target: "elsa_crawl::progress", "Cleaning up");
    }

    fn report_completed(&self, summary: &CrawlSummary) {
        info!(
            target: "elsa_crawl::progress",
            "Crawl finished: {} categories, {} documents, {} errors in {:.1}s",
            summary.categories_crawled,
            summary.documents_extracted,
            summary.errors,
            summary.duration_seconds
        );
    }

    fn report_error(&self, error: &str) {
        log::warn!(target: "elsa_crawl::progress", "{error}");
    }
}
