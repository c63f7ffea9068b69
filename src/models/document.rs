use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Category;
use crate::utils::{
    DOCUMENT_MARKERS, HTML_PREVIEW_CHARS, MIN_DOCUMENT_LENGTH, NAVIGATION_MARKERS,
    NAVIGATION_REJECT_MARKER, truncate_chars,
};

/// Which extraction path produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Taken from the frame the classifier pointed at
    Primary,
    /// Longest valid text found by scanning every frame
    Fallback,
}

/// A document pulled out of a content/detail frame
///
/// Only constructible through [`ExtractedDocument::new`], which enforces the
/// validity gate on `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub category_id: String,
    pub category_name: String,
    pub document_key: String,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExtractedDocument {
    /// Build a document, or `None` if `content` fails the validity gate
    #[must_use]
    pub fn new(
        category: &Category,
        document_key: &str,
        content: String,
        html: &str,
        url: Option<String>,
        extraction_method: ExtractionMethod,
    ) -> Option<Self> {
        if !is_valid_document_text(&content) {
            return None;
        }
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "html_preview".to_string(),
            serde_json::Value::String(truncate_chars(html, HTML_PREVIEW_CHARS).to_string()),
        );
        metadata.insert(
            "category_depth".to_string(),
            serde_json::Value::from(category.depth),
        );
        Some(Self {
            category_id: category.id.clone(),
            category_name: category.name.clone(),
            document_key: document_key.to_string(),
            title: document_key.to_string(),
            content,
            url,
            extraction_method,
            metadata,
            timestamp: Utc::now(),
        })
    }
}

/// Document validity gate: at least 100 characters and one marker phrase
#[must_use]
pub fn is_valid_document_text(text: &str) -> bool {
    text.chars().count() >= MIN_DOCUMENT_LENGTH
        && DOCUMENT_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Whether text carries the navigation-tree signature
#[must_use]
pub fn looks_like_navigation_text(text: &str) -> bool {
    NAVIGATION_MARKERS.iter().all(|marker| text.contains(marker))
        && text.contains(NAVIGATION_REJECT_MARKER)
}
