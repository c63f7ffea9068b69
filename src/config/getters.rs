//! Getter methods for `CrawlConfig`

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::CrawlConfig;
use crate::models::Vin;

impl CrawlConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn vin(&self) -> &Vin {
        &self.vin
    }

    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    #[must_use]
    pub fn max_documents_per_category(&self) -> usize {
        self.max_documents_per_category
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Per-call automation timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn frame_retry_attempts(&self) -> u32 {
        self.frame_retry_attempts
    }

    #[must_use]
    pub fn frame_retry_base(&self) -> Duration {
        Duration::from_millis(self.frame_retry_base_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn clear_before_crawl(&self) -> bool {
        self.clear_before_crawl
    }

    #[must_use]
    pub fn capture_fieldsets(&self) -> bool {
        self.capture_fieldsets
    }

    #[must_use]
    pub fn capture_history(&self) -> bool {
        self.capture_history
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&PathBuf> {
        self.chrome_data_dir.as_ref()
    }
}
