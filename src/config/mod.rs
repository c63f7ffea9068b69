//! Configuration module for crawl runs
//!
//! This module provides the `CrawlConfig` struct, its type-safe builder and
//! environment loading. A config is built once per crawl and shared as
//! `Arc<CrawlConfig>`.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{CrawlConfigBuilder, DEFAULT_OUTPUT_DIR, WithVin};
pub use types::CrawlConfig;
