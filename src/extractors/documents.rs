//! Document listing and extraction
//!
//! Listing rows are read from the content frame; a row's document key is the
//! first case-number token in its text. Document content is taken from the
//! classifier's document frame when it holds valid text, otherwise from the
//! frame with the longest valid text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::js_scripts::{CLICK_DOCUMENT_SCRIPT, DOCUMENT_BODY_SCRIPT, LIST_DOCUMENTS_SCRIPT};
use crate::automation::{AutomationError, AutomationResult, FrameHandle, PageSession};
use crate::models::{
    Category, ExtractedDocument, ExtractionMethod, is_valid_document_text,
    looks_like_navigation_text,
};
use crate::utils::CASE_NUMBER_PATTERN;

static CASE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(CASE_NUMBER_PATTERN).expect("case number pattern is valid"));

/// One linked row of a category listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    /// Position among the frame's table rows
    pub index: usize,
    pub key: String,
    pub href: String,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    index: usize,
    #[serde(default)]
    text: String,
    #[serde(default)]
    href: String,
}

#[derive(Debug, Deserialize)]
struct FrameBody {
    text: String,
    #[serde(default)]
    html: String,
}

/// First case-number token in a listing row's text
#[must_use]
pub fn document_key(row_text: &str) -> Option<String> {
    CASE_NUMBER.find(row_text).map(|m| m.as_str().to_string())
}

/// Linked rows carrying a document key, first `limit` in rendered order
pub async fn list_documents<F: FrameHandle>(
    content: &F,
    limit: usize,
) -> AutomationResult<Vec<DocumentRow>> {
    let raw = content.evaluate(LIST_DOCUMENTS_SCRIPT, Vec::new()).await?;
    let rows: Vec<RawRow> = serde_json::from_value(raw)
        .map_err(|e| AutomationError::Script(format!("document rows: {e}")))?;
    let total = rows.len();
    let listed: Vec<DocumentRow> = rows
        .into_iter()
        .filter_map(|row| {
            document_key(&row.text).map(|key| DocumentRow {
                index: row.index,
                key,
                href: row.href,
            })
        })
        .take(limit)
        .collect();
    if listed.len() < total {
        trace!("Listing: {} of {} rows kept", listed.len(), total);
    }
    Ok(listed)
}

/// Click the listing link of `key` in whichever frame shows it
///
/// Returns `false` when no frame has a linked row containing the key.
pub async fn click_document<S: PageSession>(session: &S, key: &str) -> AutomationResult<bool> {
    for frame in session.list_frames().await? {
        match frame
            .evaluate(CLICK_DOCUMENT_SCRIPT, vec![Value::from(key)])
            .await
        {
            Ok(clicked) if clicked.as_bool() == Some(true) => return Ok(true),
            Ok(_) => {}
            Err(e) => trace!("Document click skipped frame {}: {}", frame.url(), e),
        }
    }
    Ok(false)
}

/// Body text and markup of `frame`, if the text passes the validity gate
async fn valid_body<F: FrameHandle>(frame: &F) -> Option<FrameBody> {
    let raw = match frame.evaluate(DOCUMENT_BODY_SCRIPT, Vec::new()).await {
        Ok(raw) => raw,
        Err(e) => {
            trace!("No body from frame {}: {}", frame.url(), e);
            return None;
        }
    };
    let body: FrameBody = serde_json::from_value(raw).ok()?;
    (is_valid_document_text(&body.text) && !looks_like_navigation_text(&body.text)).then_some(body)
}

/// Extract the document currently shown for `key`
///
/// `Ok(None)` means no frame held valid content, which callers treat as
/// "document unavailable" rather than an error.
pub async fn extract_document<S: PageSession>(
    session: &S,
    hint: Option<&S::Frame>,
    key: &str,
    category: &Category,
) -> AutomationResult<Option<ExtractedDocument>> {
    let url = session.current_url().await.ok();

    if let Some(frame) = hint
        && let Some(body) = valid_body(frame).await
    {
        return Ok(ExtractedDocument::new(
            category,
            key,
            body.text,
            &body.html,
            url,
            ExtractionMethod::Primary,
        ));
    }

    let mut best: Option<FrameBody> = None;
    for frame in session.list_frames().await? {
        if let Some(body) = valid_body(&frame).await {
            let longer = best
                .as_ref()
                .is_none_or(|b| body.text.chars().count() > b.text.chars().count());
            if longer {
                best = Some(body);
            }
        }
    }

    match best {
        Some(body) => Ok(ExtractedDocument::new(
            category,
            key,
            body.text,
            &body.html,
            url,
            ExtractionMethod::Fallback,
        )),
        None => {
            debug!("No frame holds valid content for document {key}");
            Ok(None)
        }
    }
}
