// Sower
// Copyright (c) 2025 Sower Contributors
// Licensed and distributed under either of
//   * MIT license (license terms in the root directory or at http://opensource.org/licenses/MIT).
//   * Apache v2 license (license terms in the root directory or at http://www.apache.org/licenses/LICENSE-2.0).
// at your option. This file may not be copied, modified, or distributed except according to those terms.

// Imports
// ----------------------------------------------------------------
use std::{collections::HashMap, sync::Arc};

use sower_lib::task::ProvideTask;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{TaskStore, TaskStoreError, TaskStoreResult};

/// In-memory record map. Values are kept in their serialized form so the
/// backend exercises the same encode/decode path as a real store.
#[derive(Debug, Default)]
pub struct InMemoryTaskDb {
    records: HashMap<String, String>,
}

impl InMemoryTaskDb {
    pub fn new() -> InMemoryTaskDb {
        InMemoryTaskDb::default()
    }

    fn put(&mut self, fid: &str, task: &ProvideTask) -> TaskStoreResult<()> {
        let serialized = serde_json::to_string(task)?;
        debug!("put provide task {fid}");
        self.records.insert(fid.to_string(), serialized);
        Ok(())
    }

    fn get(&self, fid: &str) -> TaskStoreResult<ProvideTask> {
        let raw = self
            .records
            .get(fid)
            .ok_or_else(|| TaskStoreError::KeyNotFound(fid.to_string()))?;
        Ok(serde_json::from_str(raw)?)
    }

    fn delete(&mut self, fid: &str) {
        self.records.remove(fid);
    }

    fn fids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}

/// The default task-store backend.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    db: Arc<Mutex<InMemoryTaskDb>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, fid: &str, task: &ProvideTask) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.put(fid, task)
    }

    async fn get(&self, fid: &str) -> TaskStoreResult<ProvideTask> {
        let db = self.db.lock().await;
        db.get(fid)
    }

    async fn delete(&self, fid: &str) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.delete(fid);
        Ok(())
    }

    async fn fids(&self) -> TaskStoreResult<Vec<String>> {
        let db = self.db.lock().await;
        Ok(db.fids())
    }
}
