//! In-memory store for tests and dry experiments.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    error::{StoreError, StoreResult},
    store::CredentialStore,
    types::{CredentialRecord, RecordStatus},
};

/// In-memory store backed by a `BTreeMap` keyed by record id. No persistence.
pub struct InMemoryStore {
    records: Mutex<BTreeMap<String, CredentialRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: CredentialRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<CredentialRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(id).cloned()
    }

    /// Every record regardless of status, ordered by id.
    pub fn snapshot(&self) -> Vec<CredentialRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.values().cloned().collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CredentialRecord> for InMemoryStore {
    fn from_iter<I: IntoIterator<Item = CredentialRecord>>(iter: I) -> Self {
        let store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_active_records_with_secrets(&self) -> StoreResult<Vec<CredentialRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .filter(|r| r.status == RecordStatus::Active && r.has_secrets())
            .cloned()
            .collect())
    }

    async fn save_record(
        &self,
        scanned: &CredentialRecord,
        record: &CredentialRecord,
    ) -> StoreResult<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let existing = records
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::record_not_found(&record.id))?;
        if existing.access_token != scanned.access_token
            || existing.refresh_token != scanned.refresh_token
        {
            return Err(StoreError::concurrent_modification(&record.id));
        }
        existing.access_token.clone_from(&record.access_token);
        existing.refresh_token.clone_from(&record.refresh_token);
        existing.updated_at = record.updated_at;
        Ok(())
    }
}
