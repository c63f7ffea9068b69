//! Customer and vehicle fieldsets of the job screen
//!
//! Captured once, right after VIN submission, from the frame holding the VIN
//! form. Everything here is best-effort.

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::js_scripts::FIELDSET_SCRIPT;
use crate::automation::{AutomationError, AutomationResult, FrameHandle};
use crate::models::{FieldsetDetails, FieldsetSnapshot};
use crate::utils::{CUSTOMER_FIELDSET_ID, JOB_DETAIL_SELECTORS, VEHICLE_FIELDSET_ID};

/// Wait until any job-detail input is rendered
///
/// Returns `false` when none appeared; callers proceed anyway.
pub async fn wait_for_job_details<F: FrameHandle>(frame: &F, per_selector: Duration) -> bool {
    for selector in JOB_DETAIL_SELECTORS {
        if frame.wait_for_selector(selector, per_selector).await.is_ok() {
            debug!("Job detail field detected: {selector}");
            return true;
        }
    }
    warn!("Job detail fields not detected, reading fieldsets anyway");
    false
}

/// Read one fieldset by element id; `Ok(None)` when it is not rendered
pub async fn extract_fieldset<F: FrameHandle>(
    frame: &F,
    fieldset_id: &str,
) -> AutomationResult<Option<FieldsetDetails>> {
    let raw = frame
        .evaluate(FIELDSET_SCRIPT, vec![Value::from(fieldset_id)])
        .await?;
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value(raw)
        .map(Some)
        .map_err(|e| AutomationError::Script(format!("fieldset {fieldset_id}: {e}")))
}

/// Capture both fieldsets; failures leave the respective side empty
pub async fn capture_fieldsets<F: FrameHandle>(
    frame: &F,
    vin: &str,
    wait: Duration,
) -> FieldsetSnapshot {
    wait_for_job_details(frame, wait).await;

    let read = |id: &'static str| async move {
        match extract_fieldset(frame, id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Fieldset {id} extraction failed: {e}");
                None
            }
        }
    };
    let customer = read(CUSTOMER_FIELDSET_ID).await;
    let vehicle = read(VEHICLE_FIELDSET_ID).await;

    let snapshot = FieldsetSnapshot {
        vin: vin.to_string(),
        customer,
        vehicle,
        timestamp: Utc::now(),
    };
    if !snapshot.is_empty() {
        info!(
            "Captured fieldsets (customer rows: {}, vehicle rows: {})",
            snapshot.customer.as_ref().map_or(0, |f| f.rows.len()),
            snapshot.vehicle.as_ref().map_or(0, |f| f.rows.len())
        );
    }
    snapshot
}
