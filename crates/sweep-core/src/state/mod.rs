use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use sweep_model::{RunId, RunPage, RunQuery, RunRecord};

use crate::error::StoreError;

/// Persistence of completed run summaries.
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    /// Store a record. Saving the same run id twice keeps a single record.
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// Record with the most recent start time.
    async fn latest(&self) -> Result<Option<RunRecord>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<RunRecord>, StoreError>;

    /// Records ordered by start time, newest first.
    async fn list(&self, query: RunQuery) -> Result<RunPage<RunRecord>, StoreError>;
}

/// In-memory result storage.
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    inner: Arc<RwLock<HashMap<RunId, RunRecord>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn sorted(&self) -> Vec<RunRecord> {
        let inner = self.inner.read();
        let mut records: Vec<RunRecord> = inner.values().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        self.inner.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.values().max_by_key(|r| r.started_at).cloned())
    }

    async fn get(&self, id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.inner.read().get(id).cloned())
    }

    async fn list(&self, query: RunQuery) -> Result<RunPage<RunRecord>, StoreError> {
        let records = self.sorted();
        let total = records.len();

        let items = records
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(RunPage { items, total })
    }
}
