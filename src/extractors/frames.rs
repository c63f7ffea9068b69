//! Frame classification
//!
//! No frame of the portal identifies itself. After every navigation the
//! crawler re-reads each frame's content signals and assigns roles from
//! scratch; a frame reference is never carried across a navigation.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::js_scripts::CLASSIFY_FRAME_SCRIPT;
use crate::automation::{AutomationResult, FrameHandle, PageSession};
use crate::utils::{DOCUMENT_FRAME_MARKERS, DOCUMENT_FRAME_MIN_LENGTH};

/// Raw content signals of one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameSignals {
    /// Both tree markers appear inside list items
    pub has_navigation: bool,
    /// At least one table row matches the case-number pattern
    pub has_case_rows: bool,
    pub text_length: usize,
    /// Detail markers present in the body text
    pub markers: Vec<String>,
}

impl FrameSignals {
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.has_navigation
    }

    #[must_use]
    pub fn is_content(&self) -> bool {
        self.has_case_rows
    }

    #[must_use]
    pub fn is_document(&self) -> bool {
        !self.has_navigation
            && self.text_length >= DOCUMENT_FRAME_MIN_LENGTH
            && !self.markers.is_empty()
    }
}

/// Frames currently playing each role
///
/// Any role may be missing while the UI is still rendering.
#[derive(Debug, Clone)]
pub struct FrameRoles<F> {
    pub navigation: Option<F>,
    pub content: Option<F>,
    pub document: Option<F>,
}

impl<F> Default for FrameRoles<F> {
    fn default() -> Self {
        Self {
            navigation: None,
            content: None,
            document: None,
        }
    }
}

impl<F> FrameRoles<F> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.navigation.is_none() && self.content.is_none() && self.document.is_none()
    }
}

/// Read the classification signals of one frame
pub async fn frame_signals<F: FrameHandle>(frame: &F) -> AutomationResult<FrameSignals> {
    let markers: Vec<Value> = DOCUMENT_FRAME_MARKERS.iter().map(|m| Value::from(*m)).collect();
    let raw = frame
        .evaluate(CLASSIFY_FRAME_SCRIPT, vec![Value::Array(markers)])
        .await?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Assign roles to `frames`; the first match per role wins
///
/// Frames that fail to evaluate (detached, mid-navigation) are skipped.
pub async fn classify_frames<F>(frames: &[F]) -> FrameRoles<F>
where
    F: FrameHandle + Clone,
{
    let mut roles = FrameRoles::default();
    for frame in frames {
        let signals = match frame_signals(frame).await {
            Ok(signals) => signals,
            Err(e) => {
                trace!("Skipping frame {} during classification: {}", frame.url(), e);
                continue;
            }
        };
        if roles.navigation.is_none() && signals.is_navigation() {
            roles.navigation = Some(frame.clone());
        }
        if roles.content.is_none() && signals.is_content() {
            roles.content = Some(frame.clone());
        }
        if roles.document.is_none() && signals.is_document() {
            roles.document = Some(frame.clone());
        }
    }
    roles
}

/// List the session's current frames and classify them
pub async fn classify_session<S: PageSession>(session: &S) -> AutomationResult<FrameRoles<S::Frame>> {
    let frames = session.list_frames().await?;
    Ok(classify_frames(&frames).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(nav: bool, rows: bool, len: usize, markers: &[&str]) -> FrameSignals {
        FrameSignals {
            has_navigation: nav,
            has_case_rows: rows,
            text_length: len,
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn navigation_frame_is_never_a_document() {
        let s = signals(true, false, 5_000, &["Lösung"]);
        assert!(s.is_navigation());
        assert!(!s.is_document());
    }

    #[test]
    fn document_needs_length_and_marker() {
        assert!(signals(false, false, 200, &["Datum:"]).is_document());
        assert!(!signals(false, false, 199, &["Datum:"]).is_document());
        assert!(!signals(false, false, 1_000, &[]).is_document());
    }

    #[test]
    fn missing_fields_deserialize_as_empty_signals() {
        let s: FrameSignals = serde_json::from_value(serde_json::json!({ "hasCaseRows": true }))
            .expect("signals");
        assert!(s.is_content());
        assert!(!s.is_navigation());
        assert_eq!(s.text_length, 0);
    }
}
