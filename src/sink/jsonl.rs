//! File-backed store: one directory per VIN
//!
//! ```text
//! <root>/elsadocs_<vin>/documents.jsonl   append-only, one SinkRecord per line
//! <root>/elsadocs_<vin>/history.json      last emitted VehicleHistory
//! <root>/elsadocs_<vin>/fieldsets.json    last emitted FieldsetSnapshot
//! ```
//!
//! Re-running a crawl appends again; reads collapse records to the latest
//! one per document id.

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{DocumentFilter, DocumentSink, SinkRecord, SinkResult};
use crate::models::{FieldsetSnapshot, VehicleHistory, collection_name};

const DOCUMENTS_FILE: &str = "documents.jsonl";
const HISTORY_FILE: &str = "history.json";
const FIELDSETS_FILE: &str = "fieldsets.json";
const COLLECTION_PREFIX: &str = "elsadocs_";

#[derive(Debug)]
pub struct JsonlStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn collection_dir(&self, vin: &str) -> PathBuf {
        self.root.join(collection_name(vin))
    }

    async fn write_json<T: serde::Serialize>(&self, vin: &str, file: &str, value: &T) -> SinkResult<()> {
        let json = serde_json::to_vec_pretty(value)?;
        let dir = self.collection_dir(vin);
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(file), json).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, vin: &str, file: &str) -> SinkResult<Option<T>> {
        match tokio::fs::read(self.collection_dir(vin).join(file)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every record of one collection, in append order
    ///
    /// Unparseable lines (e.g. a torn write) are skipped with a warning.
    async fn read_records(dir: &Path) -> SinkResult<Vec<SinkRecord>> {
        let path = dir.join(DOCUMENTS_FILE);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SinkRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{}:{}: skipping unreadable record: {e}", path.display(), n + 1),
            }
        }
        Ok(records)
    }

    /// Latest record per document id, in first-seen order
    fn latest_per_id(records: Vec<SinkRecord>) -> Vec<SinkRecord> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut latest: Vec<SinkRecord> = Vec::new();
        for record in records {
            match index.get(&record.document_id()) {
                Some(&i) => latest[i] = record,
                None => {
                    index.insert(record.document_id(), latest.len());
                    latest.push(record);
                }
            }
        }
        latest
    }

    /// All collection directories under the root
    async fn collections(&self) -> SinkResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let is_collection = entry.file_name().to_string_lossy().starts_with(COLLECTION_PREFIX);
            if is_collection && entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Persisted documents of one VIN, latest version of each
    pub async fn get_documents(&self, vin: &str) -> SinkResult<Vec<SinkRecord>> {
        let records = Self::read_records(&self.collection_dir(vin)).await?;
        Ok(Self::latest_per_id(records))
    }

    /// Documents matching `filter`, across all VINs unless the filter names one
    pub async fn search_documents(&self, filter: &DocumentFilter) -> SinkResult<Vec<SinkRecord>> {
        let dirs = match &filter.vin {
            Some(vin) => vec![self.collection_dir(vin)],
            None => self.collections().await?,
        };
        let mut hits = Vec::new();
        for dir in dirs {
            let records = Self::latest_per_id(Self::read_records(&dir).await?);
            hits.extend(records.into_iter().filter(|r| filter.matches(r)));
        }
        if let Some(limit) = filter.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    pub async fn get_history(&self, vin: &str) -> SinkResult<Option<VehicleHistory>> {
        self.read_json(vin, HISTORY_FILE).await
    }

    pub async fn get_fieldsets(&self, vin: &str) -> SinkResult<Option<FieldsetSnapshot>> {
        self.read_json(vin, FIELDSETS_FILE).await
    }

    /// Remove everything stored for `vin`
    pub async fn clear_vin(&self, vin: &str) -> SinkResult<()> {
        let dir = self.collection_dir(vin);
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Cleared {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentSink for JsonlStore {
    async fn emit(&self, record: &SinkRecord) -> SinkResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let dir = self.collection_dir(&record.vin);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DOCUMENTS_FILE))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn emit_history(&self, history: &VehicleHistory) -> SinkResult<()> {
        self.write_json(&history.vin, HISTORY_FILE, history).await
    }

    async fn emit_fieldsets(&self, snapshot: &FieldsetSnapshot) -> SinkResult<()> {
        self.write_json(&snapshot.vin, FIELDSETS_FILE, snapshot).await
    }
}
