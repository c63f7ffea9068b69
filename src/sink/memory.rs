use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DocumentSink, SinkRecord, SinkResult};
use crate::models::{FieldsetSnapshot, VehicleHistory};

/// Keeps everything it receives; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
    histories: Mutex<Vec<VehicleHistory>>,
    fieldsets: Mutex<Vec<FieldsetSnapshot>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn histories(&self) -> Vec<VehicleHistory> {
        self.histories.lock().clone()
    }

    #[must_use]
    pub fn fieldsets(&self) -> Vec<FieldsetSnapshot> {
        self.fieldsets.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn emit(&self, record: &SinkRecord) -> SinkResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn emit_history(&self, history: &VehicleHistory) -> SinkResult<()> {
        self.histories.lock().push(history.clone());
        Ok(())
    }

    async fn emit_fieldsets(&self, snapshot: &FieldsetSnapshot) -> SinkResult<()> {
        self.fieldsets.lock().push(snapshot.clone());
        Ok(())
    }
}
