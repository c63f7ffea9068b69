use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-worker crawl counters
///
/// Counters only move forward; the only way to reset is to build a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerStats {
    categories_crawled: u64,
    documents_extracted: u64,
    errors: u64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl CrawlerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn categories_crawled(&self) -> u64 {
        self.categories_crawled
    }

    #[must_use]
    pub fn documents_extracted(&self) -> u64 {
        self.documents_extracted
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn record_category(&mut self) {
        self.categories_crawled += 1;
    }

    pub fn record_document(&mut self) {
        self.documents_extracted += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Stamp the start time once; later calls keep the first stamp
    pub fn mark_started(&mut self) {
        self.start_time.get_or_insert_with(Utc::now);
    }

    pub fn mark_finished(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Element-wise sum of counters; earliest start, latest end
    #[must_use]
    pub fn aggregate<'a>(stats: impl IntoIterator<Item = &'a CrawlerStats>) -> Self {
        stats.into_iter().fold(Self::default(), |mut acc, s| {
            acc.categories_crawled += s.categories_crawled;
            acc.documents_extracted += s.documents_extracted;
            acc.errors += s.errors;
            acc.start_time = match (acc.start_time, s.start_time) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            acc.end_time = match (acc.end_time, s.end_time) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            acc
        })
    }

    /// Wall-clock duration between start and end, if both are set
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds().max(0) as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

/// A worker that never got past initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub worker_id: usize,
    pub message: String,
}

/// Final report of one crawl
///
/// Counters are the exact element-wise sum of `worker_stats`. A crawl with
/// `errors > 0` or any failed worker is not clean even though it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub vin: String,
    pub workers: usize,
    pub categories_crawled: u64,
    pub documents_extracted: u64,
    pub errors: u64,
    pub duration_seconds: f64,
    pub cancelled: bool,
    pub failed_workers: Vec<WorkerFailure>,
    pub worker_stats: Vec<CrawlerStats>,
}

impl CrawlSummary {
    #[must_use]
    pub fn from_workers(
        vin: &str,
        worker_stats: Vec<CrawlerStats>,
        failed_workers: Vec<WorkerFailure>,
        cancelled: bool,
    ) -> Self {
        let total = CrawlerStats::aggregate(&worker_stats);
        Self {
            vin: vin.to_string(),
            workers: worker_stats.len() + failed_workers.len(),
            categories_crawled: total.categories_crawled,
            documents_extracted: total.documents_extracted,
            errors: total.errors,
            duration_seconds: total.duration_seconds().unwrap_or_default(),
            cancelled,
            failed_workers,
            worker_stats,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.failed_workers.is_empty() && !self.cancelled
    }
}
