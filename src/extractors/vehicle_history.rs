//! Vehicle service history
//!
//! The history lives behind a link in the main frame that opens a separate
//! tab. The tab is always closed again, whether extraction succeeded or not.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::js_scripts::{HISTORY_EXPAND_SCRIPT, HISTORY_ROWS_SCRIPT, LINK_HREF_SCRIPT};
use crate::automation::{AutomationError, AutomationResult, FrameHandle, PageSession};
use crate::models::{RawHistoryRow, VehicleHistory};
use crate::utils::{
    HISTORY_FRAME_URL_HINTS, HISTORY_GRID_SELECTOR, HISTORY_LINK_TEXT, MAIN_FRAME_NAME,
};

/// Frame that hosts the history link: the one named `mainFs`, else any
/// frame that resolves the link
async fn history_link<S: PageSession>(session: &S) -> AutomationResult<String> {
    let mut frames = session.list_frames().await?;
    // Named frame first; the rest keep their order.
    frames.sort_by_key(|f| f.name() != Some(MAIN_FRAME_NAME));

    for frame in &frames {
        match frame
            .evaluate(LINK_HREF_SCRIPT, vec![Value::from(HISTORY_LINK_TEXT)])
            .await
        {
            Ok(Value::String(href)) if !href.is_empty() => return Ok(href),
            Ok(_) => {}
            Err(e) => debug!("History link lookup skipped frame {}: {}", frame.url(), e),
        }
    }
    Err(AutomationError::NotFound(format!("link {HISTORY_LINK_TEXT:?}")))
}

/// Frame rendering the history grid inside the opened tab
fn history_frame<F: FrameHandle + Clone>(frames: &[F]) -> Option<F> {
    frames
        .iter()
        .find(|f| HISTORY_FRAME_URL_HINTS.iter().any(|hint| f.url().contains(hint)))
        .or_else(|| frames.get(1))
        .or_else(|| frames.first())
        .cloned()
}

async fn read_history<S: PageSession>(
    tab: &S,
    vin: &str,
    settle: Duration,
    timeout: Duration,
) -> AutomationResult<VehicleHistory> {
    tokio::time::sleep(settle).await;
    let frames = tab.list_frames().await?;
    let frame = history_frame(&frames)
        .ok_or_else(|| AutomationError::NotFound("history frame".to_string()))?;

    frame.wait_for_selector(HISTORY_GRID_SELECTOR, timeout).await?;

    let expanded = frame.evaluate(HISTORY_EXPAND_SCRIPT, Vec::new()).await?;
    debug!("History expansion: {expanded}");
    tokio::time::sleep(settle).await;

    let raw = frame.evaluate(HISTORY_ROWS_SCRIPT, Vec::new()).await?;
    let rows: Vec<RawHistoryRow> = serde_json::from_value(raw)
        .map_err(|e| AutomationError::Script(format!("history rows: {e}")))?;
    Ok(VehicleHistory::from_rows(vin, rows))
}

/// Open the history tab of the current job and read every entry
pub async fn extract_vehicle_history<S: PageSession>(
    session: &S,
    vin: &str,
    settle: Duration,
    timeout: Duration,
) -> AutomationResult<VehicleHistory> {
    let href = history_link(session).await?;
    info!("Opening vehicle history");
    let tab = session.open_tab(&href).await?;

    let result = read_history(&tab, vin, settle, timeout).await;

    if let Err(e) = tab.close().await {
        warn!("Failed to close history tab: {e}");
    }

    if let Ok(history) = &result {
        info!(
            "Vehicle history: {} entries ({} valid, {} failed)",
            history.total_entries, history.successful_entries, history.failed_entries
        );
    }
    result
}
