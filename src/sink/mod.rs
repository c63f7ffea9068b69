//! Downstream sinks for extracted data
//!
//! The crawl engine emits fire-and-forget: a failing sink is logged by the
//! caller and never aborts a branch.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::crawl_engine::CrawlError;
use crate::models::{ExtractedDocument, FieldsetSnapshot, VehicleHistory};

pub use jsonl::JsonlStore;
pub use memory::MemorySink;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<SinkError> for CrawlError {
    fn from(err: SinkError) -> Self {
        Self::Sink(err.to_string())
    }
}

pub type SinkResult<T> = Result<T, SinkError>;

/// A document as handed to the sink, tagged with the crawl's VIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub vin: String,
    #[serde(flatten)]
    pub document: ExtractedDocument,
}

impl SinkRecord {
    pub fn new(vin: impl Into<String>, document: ExtractedDocument) -> Self {
        Self {
            vin: vin.into(),
            document,
        }
    }

    /// `(vin, category_id)`
    #[must_use]
    pub fn category_key(&self) -> String {
        format!("{}:{}", self.vin, self.document.category_id)
    }

    /// `(vin, category_id, document_key)`; stable across re-runs
    #[must_use]
    pub fn document_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.vin, self.document.category_id, self.document.document_key
        )
    }
}

/// Receives everything a crawl produces
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn emit(&self, record: &SinkRecord) -> SinkResult<()>;

    /// Called at most once per crawl
    async fn emit_history(&self, history: &VehicleHistory) -> SinkResult<()>;

    /// Called at most once per crawl
    async fn emit_fieldsets(&self, snapshot: &FieldsetSnapshot) -> SinkResult<()>;
}

#[async_trait]
impl<T: DocumentSink + ?Sized> DocumentSink for Arc<T> {
    async fn emit(&self, record: &SinkRecord) -> SinkResult<()> {
        (**self).emit(record).await
    }

    async fn emit_history(&self, history: &VehicleHistory) -> SinkResult<()> {
        (**self).emit_history(history).await
    }

    async fn emit_fieldsets(&self, snapshot: &FieldsetSnapshot) -> SinkResult<()> {
        (**self).emit_fieldsets(snapshot).await
    }
}

/// Read filter over persisted documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub vin: Option<String>,
    /// Matches the category id or name exactly
    pub category: Option<String>,
    /// Case-insensitive substring of title or content
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl DocumentFilter {
    #[must_use]
    pub fn matches(&self, record: &SinkRecord) -> bool {
        if let Some(vin) = &self.vin
            && !record.vin.eq_ignore_ascii_case(vin.trim())
        {
            return false;
        }
        if let Some(category) = &self.category
            && record.document.category_id != *category
            && record.document.category_name != *category
        {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let doc = &record.document;
            if !doc.title.to_lowercase().contains(&needle)
                && !doc.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Emits to every inner sink; the first failure is returned after all ran
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DocumentSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn DocumentSink>>) -> Self {
        Self { sinks }
    }

    fn settle(results: Vec<SinkResult<()>>) -> SinkResult<()> {
        let mut first = None;
        for result in results {
            if let Err(e) = result {
                warn!("Sink failed: {e}");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl DocumentSink for FanoutSink {
    async fn emit(&self, record: &SinkRecord) -> SinkResult<()> {
        let results =
            futures::future::join_all(self.sinks.iter().map(|sink| sink.emit(record))).await;
        Self::settle(results)
    }

    async fn emit_history(&self, history: &VehicleHistory) -> SinkResult<()> {
        let results =
            futures::future::join_all(self.sinks.iter().map(|sink| sink.emit_history(history)))
                .await;
        Self::settle(results)
    }

    async fn emit_fieldsets(&self, snapshot: &FieldsetSnapshot) -> SinkResult<()> {
        let results =
            futures::future::join_all(self.sinks.iter().map(|sink| sink.emit_fieldsets(snapshot)))
                .await;
        Self::settle(results)
    }
}
