use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One label/value row of a job fieldset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsetRow {
    pub label: String,
    pub value: String,
    pub raw: String,
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub input_id: Option<String>,
}

/// Customer or vehicle block of the job screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsetDetails {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub raw_text: String,
    pub rows: Vec<FieldsetRow>,
    pub html: String,
}

impl FieldsetDetails {
    /// Value of the first row whose label contains `label`
    #[must_use]
    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.label.contains(label))
            .map(|row| row.value.as_str())
    }
}

/// Fieldsets captured once per crawl, right after VIN submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldsetSnapshot {
    pub vin: String,
    pub customer: Option<FieldsetDetails>,
    pub vehicle: Option<FieldsetDetails>,
    pub timestamp: DateTime<Utc>,
}

impl FieldsetSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.customer.is_none() && self.vehicle.is_none()
    }
}
