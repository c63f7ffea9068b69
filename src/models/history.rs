//! Vehicle service history
//!
//! Entries are a closed set of variants. Each is validated when it is built
//! from a scraped row: `acceptance_date`, `mileage` and `order_number` must
//! be present, otherwise the row counts as a failed entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row of an embedded history table, keyed by column header
pub type TableRow = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValue {
    pub label: String,
    pub value: String,
}

/// "Digitaler Serviceplan" entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePlanEntry {
    pub acceptance_date: String,
    pub mileage: u64,
    pub order_number: String,
    pub service_proof: String,
    pub additional_work: Vec<TableRow>,
    pub remarks: Vec<LabelValue>,
}

/// "Beanstandung" entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintEntry {
    pub acceptance_date: String,
    pub mileage: u64,
    pub order_number: String,
    pub ba_id: String,
    pub customer_complaint: Option<String>,
    pub customer_coding: Option<String>,
    pub workshop_finding: Option<String>,
    pub workshop_coding: Option<String>,
    pub damage_part: Option<String>,
}

/// "Rechnung" entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceEntry {
    pub acceptance_date: String,
    pub mileage: u64,
    pub order_number: String,
    pub invoice_number: String,
    pub remark: Option<String>,
    pub work_positions: Vec<TableRow>,
    pub parts_positions: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum HistoryEntry {
    ServicePlan(ServicePlanEntry),
    Complaint(ComplaintEntry),
    Invoice(InvoiceEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryEntryError {
    #[error("unknown history entry type: {0:?}")]
    UnknownType(String),
    #[error("history entry is missing required field {0}")]
    MissingField(&'static str),
    #[error("history entry has unparseable mileage {0:?}")]
    InvalidMileage(String),
}

/// One embedded table of a history row as scraped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// A history row as returned by the page script, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryRow {
    pub entry_type: String,
    /// Inner text of every field cell (`label:\nvalue`)
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

impl RawHistoryRow {
    /// Value of the field cell whose text contains `label` (second line of the cell)
    #[must_use]
    pub fn field(&self, label: &str) -> Option<String> {
        self.fields
            .iter()
            .filter(|text| text.contains(label))
            .find_map(|text| {
                let mut lines = text.lines();
                lines.next()?;
                let value = lines.next()?.trim();
                Some(value.to_string())
            })
    }

    fn table_titled(&self, title: &str) -> Vec<TableRow> {
        let Some(table) = self.tables.iter().find(|t| t.title.contains(title)) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .map(|cells| {
                table
                    .headers
                    .iter()
                    .zip(cells)
                    .map(|(h, c)| (h.trim().to_string(), c.trim().to_string()))
                    .collect()
            })
            .collect()
    }

    /// Two-column rows of the first table in the entry
    fn label_rows(&self) -> Vec<LabelValue> {
        self.tables
            .first()
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|cells| cells.len() >= 2)
                    .map(|cells| LabelValue {
                        label: cells[0].trim().to_string(),
                        value: cells[1].trim().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn required(&self, label: &str, name: &'static str) -> Result<String, HistoryEntryError> {
        self.field(label)
            .filter(|v| !v.is_empty())
            .ok_or(HistoryEntryError::MissingField(name))
    }

    fn mileage(&self) -> Result<u64, HistoryEntryError> {
        let raw = self.required("Laufleistung:", "mileage")?;
        parse_mileage(&raw).ok_or(HistoryEntryError::InvalidMileage(raw))
    }
}

/// Parse a mileage like `123.456 km` (dots are thousands separators)
#[must_use]
pub fn parse_mileage(raw: &str) -> Option<u64> {
    let digits: String = raw
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl TryFrom<RawHistoryRow> for HistoryEntry {
    type Error = HistoryEntryError;

    fn try_from(row: RawHistoryRow) -> Result<Self, Self::Error> {
        let acceptance_date = row.required("Annahmetermin:", "acceptance_date")?;
        let order_number = row.required("Auftrags-Nr", "order_number")?;
        let kind = row.entry_type.trim();

        if kind.contains("Digitaler Serviceplan") {
            Ok(Self::ServicePlan(ServicePlanEntry {
                mileage: row.mileage()?,
                service_proof: row.field("Service-Nachweis:").unwrap_or_default(),
                additional_work: row.table_titled("Zusatzarbeiten"),
                remarks: row.label_rows(),
                acceptance_date,
                order_number,
            }))
        } else if kind.contains("Beanstandung") {
            let mut entry = ComplaintEntry {
                mileage: row.mileage()?,
                ba_id: row.field("BA-ID:").unwrap_or_default(),
                customer_complaint: None,
                customer_coding: None,
                workshop_finding: None,
                workshop_coding: None,
                damage_part: None,
                acceptance_date,
                order_number,
            };
            for LabelValue { label, value } in row.label_rows() {
                let slot = if label.contains("Kundenbeanstandung") {
                    &mut entry.customer_complaint
                } else if label.contains("Kundenkodierung") {
                    &mut entry.customer_coding
                } else if label.contains("Werkstattfeststellung") {
                    &mut entry.workshop_finding
                } else if label.contains("Werkstattkodierung") {
                    &mut entry.workshop_coding
                } else if label.contains("Schadensbehebendes Ersatzteil") {
                    &mut entry.damage_part
                } else {
                    continue;
                };
                *slot = Some(value);
            }
            Ok(Self::Complaint(entry))
        } else if kind.contains("Rechnung") {
            Ok(Self::Invoice(InvoiceEntry {
                mileage: row.mileage()?,
                invoice_number: row.field("Rechnungs-Nr").unwrap_or_default(),
                remark: row.field("Anmerk.").filter(|r| !r.is_empty()),
                work_positions: row.table_titled("Arbeitsposition"),
                parts_positions: row.table_titled("Teileposition"),
                acceptance_date,
                order_number,
            }))
        } else {
            Err(HistoryEntryError::UnknownType(kind.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Complete,
    Partial,
}

/// Complete service history of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleHistory {
    pub vin: String,
    pub extraction_timestamp: DateTime<Utc>,
    pub status: HistoryStatus,
    pub total_entries: usize,
    pub successful_entries: usize,
    pub failed_entries: usize,
    pub entries: Vec<HistoryEntry>,
}

impl VehicleHistory {
    /// Validate scraped rows; rows that fail validation are counted, not kept
    #[must_use]
    pub fn from_rows(vin: &str, rows: Vec<RawHistoryRow>) -> Self {
        let total_entries = rows.len();
        let mut entries = Vec::with_capacity(total_entries);
        for row in rows {
            match HistoryEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!(target: "elsa_crawl::history", "Skipping history row: {e}"),
            }
        }
        let successful_entries = entries.len();
        let failed_entries = total_entries - successful_entries;
        Self {
            vin: vin.to_string(),
            extraction_timestamp: Utc::now(),
            status: if failed_entries == 0 {
                HistoryStatus::Complete
            } else {
                HistoryStatus::Partial
            },
            total_entries,
            successful_entries,
            failed_entries,
            entries,
        }
    }
}
