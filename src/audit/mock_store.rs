//! Mock implementation of the AuditStore trait for testing

use crate::audit::{paginate, AuditError, AuditFilter, AuditRecord, AuditStore};
use crate::pagination::PaginatedResponse;
use std::sync::{Arc, Mutex};

/// Mock implementation of AuditStore backed by an in-memory vec.
pub struct MockAuditStore {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MockAuditStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl Default for MockAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for MockAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut records = self.records.lock().unwrap();
        let mut stored = record.clone();
        stored.id = records.len() as i64 + 1;
        records.push(stored);
        Ok(())
    }

    fn get_all(
        &self,
        filter: &AuditFilter,
        skip: Option<usize>,
        take: Option<usize>,
    ) -> Result<PaginatedResponse<AuditRecord>, AuditError> {
        let records = self.records.lock().unwrap().clone();
        Ok(paginate(records, filter, skip, take))
    }
}
