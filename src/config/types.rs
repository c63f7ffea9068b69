//! Core configuration types for crawl runs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Vin;

/// Configuration of one crawl
///
/// Built through [`CrawlConfig::builder`], which validates every range below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Portal entry point; login and every worker session start here
    pub(crate) base_url: String,

    /// Vehicle being crawled; partition key for everything persisted
    pub(crate) vin: Vin,

    /// Number of parallel workers (1..=10)
    pub(crate) max_workers: usize,

    /// Cap on document rows taken from one category listing (1..=500)
    ///
    /// Rows beyond the cap are skipped, first N rows in rendered order win.
    pub(crate) max_documents_per_category: usize,

    pub(crate) headless: bool,

    /// Per-call automation timeout in milliseconds (at least 5000)
    pub(crate) timeout_ms: u64,

    /// Attempts for frame classification after a navigation
    pub(crate) frame_retry_attempts: u32,

    /// Base delay of the classification backoff
    pub(crate) frame_retry_base_ms: u64,

    /// Pause after UI clicks before frames are queried again
    pub(crate) settle_delay_ms: u64,

    /// Root directory of the JSONL store
    pub(crate) output_dir: PathBuf,

    /// Drop previously stored records for the VIN before crawling
    pub(crate) clear_before_crawl: bool,

    pub(crate) capture_fieldsets: bool,

    pub(crate) capture_history: bool,

    /// Parent directory for Chrome profiles; system temp dir when unset
    pub(crate) chrome_data_dir: Option<PathBuf>,
}
