//! Data model shared by the extractors, the crawl engine and the sinks

pub mod category;
pub mod document;
pub mod fieldset;
pub mod history;
pub mod stats;
pub mod vin;

pub use category::{Category, category_id, is_placeholder_href};
pub use document::{
    ExtractedDocument, ExtractionMethod, is_valid_document_text, looks_like_navigation_text,
};
pub use fieldset::{FieldsetDetails, FieldsetRow, FieldsetSnapshot};
pub use history::{
    ComplaintEntry, HistoryEntry, HistoryEntryError, HistoryStatus, InvoiceEntry, LabelValue,
    RawHistoryRow, RawTable, ServicePlanEntry, TableRow, VehicleHistory,
};
pub use stats::{CrawlSummary, CrawlerStats, WorkerFailure};
pub use vin::{Vin, VinError, collection_name};
