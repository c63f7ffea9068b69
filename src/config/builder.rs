//! Type-safe builder for `CrawlConfig` using the typestate pattern
//!
//! `build()` only exists once a VIN has been supplied, and it validates every
//! numeric range before handing out a config.

use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::CrawlConfig;
use crate::crawl_engine::{CrawlError, CrawlResult};
use crate::models::Vin;
use crate::utils::{
    DEFAULT_BASE_URL, DEFAULT_FRAME_RETRY_ATTEMPTS, DEFAULT_FRAME_RETRY_BASE_MS,
    DEFAULT_MAX_DOCUMENTS_PER_CATEGORY, DEFAULT_MAX_WORKERS, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TIMEOUT_MS, MAX_DOCUMENTS_LIMIT, MAX_WORKERS_LIMIT, MIN_TIMEOUT_MS,
};

/// Default root directory of the JSONL store
pub const DEFAULT_OUTPUT_DIR: &str = "./elsa_data";

// Type states for the builder
pub struct WithVin;

pub struct CrawlConfigBuilder<State = ()> {
    pub(crate) base_url: String,
    pub(crate) vin: Option<Vin>,
    pub(crate) max_workers: usize,
    pub(crate) max_documents_per_category: usize,
    pub(crate) headless: bool,
    pub(crate) timeout_ms: u64,
    pub(crate) frame_retry_attempts: u32,
    pub(crate) frame_retry_base_ms: u64,
    pub(crate) settle_delay_ms: u64,
    pub(crate) output_dir: PathBuf,
    pub(crate) clear_before_crawl: bool,
    pub(crate) capture_fieldsets: bool,
    pub(crate) capture_history: bool,
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for CrawlConfigBuilder<()> {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            vin: None,
            max_workers: DEFAULT_MAX_WORKERS,
            max_documents_per_category: DEFAULT_MAX_DOCUMENTS_PER_CATEGORY,
            headless: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            frame_retry_attempts: DEFAULT_FRAME_RETRY_ATTEMPTS,
            frame_retry_base_ms: DEFAULT_FRAME_RETRY_BASE_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            clear_before_crawl: true,
            capture_fieldsets: true,
            capture_history: true,
            chrome_data_dir: None,
            _phantom: PhantomData,
        }
    }
}

impl CrawlConfig {
    /// Create a builder for configuring a `CrawlConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder<()> {
        CrawlConfigBuilder::default()
    }
}

impl CrawlConfigBuilder<()> {
    pub fn vin(self, vin: Vin) -> CrawlConfigBuilder<WithVin> {
        CrawlConfigBuilder {
            base_url: self.base_url,
            vin: Some(vin),
            max_workers: self.max_workers,
            max_documents_per_category: self.max_documents_per_category,
            headless: self.headless,
            timeout_ms: self.timeout_ms,
            frame_retry_attempts: self.frame_retry_attempts,
            frame_retry_base_ms: self.frame_retry_base_ms,
            settle_delay_ms: self.settle_delay_ms,
            output_dir: self.output_dir,
            clear_before_crawl: self.clear_before_crawl,
            capture_fieldsets: self.capture_fieldsets,
            capture_history: self.capture_history,
            chrome_data_dir: self.chrome_data_dir,
            _phantom: PhantomData,
        }
    }
}

// Build method only available when the VIN is set
impl CrawlConfigBuilder<WithVin> {
    pub fn build(self) -> CrawlResult<CrawlConfig> {
        let vin = self
            .vin
            .ok_or_else(|| CrawlError::Config("vin is required".into()))?;

        if !(1..=MAX_WORKERS_LIMIT).contains(&self.max_workers) {
            return Err(CrawlError::Config(format!(
                "max_workers must be between 1 and {MAX_WORKERS_LIMIT}, got {}",
                self.max_workers
            )));
        }
        if !(1..=MAX_DOCUMENTS_LIMIT).contains(&self.max_documents_per_category) {
            return Err(CrawlError::Config(format!(
                "max_documents_per_category must be between 1 and {MAX_DOCUMENTS_LIMIT}, got {}",
                self.max_documents_per_category
            )));
        }
        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(CrawlError::Config(format!(
                "timeout_ms must be at least {MIN_TIMEOUT_MS}, got {}",
                self.timeout_ms
            )));
        }
        if self.frame_retry_attempts == 0 {
            return Err(CrawlError::Config(
                "frame_retry_attempts must be at least 1".into(),
            ));
        }
        let base_url = url::Url::parse(&self.base_url)
            .map_err(|e| CrawlError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;

        Ok(CrawlConfig {
            base_url: base_url.to_string(),
            vin,
            max_workers: self.max_workers,
            max_documents_per_category: self.max_documents_per_category,
            headless: self.headless,
            timeout_ms: self.timeout_ms,
            frame_retry_attempts: self.frame_retry_attempts,
            frame_retry_base_ms: self.frame_retry_base_ms,
            settle_delay_ms: self.settle_delay_ms,
            output_dir: self.output_dir,
            clear_before_crawl: self.clear_before_crawl,
            capture_fieldsets: self.capture_fieldsets,
            capture_history: self.capture_history,
            chrome_data_dir: self.chrome_data_dir,
        })
    }
}
