use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreError};
use crate::auth::lookup_digest;

/// Process-local store for tests and database-less runs.
///
/// Records are keyed by user id; every operation runs under one lock so
/// `replace` is atomic with respect to concurrent rotations.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record of a user, if any.
    pub fn get(&self, user_id: &str) -> Option<RefreshTokenRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(user_id).cloned())
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<String, RefreshTokenRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Storage("refresh token store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn put(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        self.records()?.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn lookup(&self, presented_token: &str) -> Result<RefreshTokenRecord, StoreError> {
        let digest = lookup_digest(presented_token);

        self.records()?
            .values()
            .find(|record| record.lookup_digest == digest)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn replace(
        &self,
        expected_digest: &str,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut records = self.records()?;

        match records.get_mut(&record.user_id) {
            None => Err(StoreError::NotFound),
            Some(current) if current.lookup_digest != expected_digest => Err(StoreError::Conflict),
            Some(current) => {
                *current = record;
                Ok(())
            }
        }
    }
}
