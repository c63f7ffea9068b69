//! Environment overrides for `CrawlConfig`
//!
//! The binary loads `.env` with `dotenvy` before calling
//! [`CrawlConfig::from_env`]; library callers can pass any lookup to
//! [`CrawlConfig::from_lookup`].

use std::str::FromStr;

use super::builder::{CrawlConfigBuilder, WithVin};
use super::types::CrawlConfig;
use crate::crawl_engine::{CrawlError, CrawlResult};
use crate::models::Vin;

pub const ENV_BASE_URL: &str = "ELSA_BASE_URL";
pub const ENV_MAX_WORKERS: &str = "ELSA_MAX_WORKERS";
pub const ENV_MAX_DOCUMENTS: &str = "ELSA_MAX_DOCUMENTS";
pub const ENV_HEADLESS: &str = "ELSA_HEADLESS";
pub const ENV_TIMEOUT_MS: &str = "ELSA_TIMEOUT_MS";
pub const ENV_OUTPUT_DIR: &str = "ELSA_OUTPUT_DIR";
pub const ENV_CLEAR_BEFORE_CRAWL: &str = "ELSA_CLEAR_BEFORE_CRAWL";

impl CrawlConfig {
    /// Builder for `vin` with overrides from the process environment applied
    pub fn from_env(vin: Vin) -> CrawlResult<CrawlConfigBuilder<WithVin>> {
        Self::from_lookup(vin, |key| std::env::var(key).ok())
    }

    /// Builder for `vin` with overrides from `lookup` applied
    ///
    /// Unset keys keep their defaults; a set but unparsable value is a
    /// configuration error rather than silently ignored.
    pub fn from_lookup(
        vin: Vin,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> CrawlResult<CrawlConfigBuilder<WithVin>> {
        let mut builder = CrawlConfig::builder().vin(vin);

        if let Some(url) = lookup(ENV_BASE_URL) {
            builder = builder.base_url(url);
        }
        if let Some(workers) = parse_var::<usize>(&lookup, ENV_MAX_WORKERS)? {
            builder = builder.max_workers(workers);
        }
        if let Some(max) = parse_var::<usize>(&lookup, ENV_MAX_DOCUMENTS)? {
            builder = builder.max_documents_per_category(max);
        }
        if let Some(headless) = parse_flag(&lookup, ENV_HEADLESS)? {
            builder = builder.headless(headless);
        }
        if let Some(timeout) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS)? {
            builder = builder.timeout_ms(timeout);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            builder = builder.output_dir(dir);
        }
        if let Some(clear) = parse_flag(&lookup, ENV_CLEAR_BEFORE_CRAWL)? {
            builder = builder.clear_before_crawl(clear);
        }
        Ok(builder)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> CrawlResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| CrawlError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> CrawlResult<Option<bool>> {
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(CrawlError::Config(format!("{key}={raw}: expected a boolean"))),
        })
        .transpose()
}
