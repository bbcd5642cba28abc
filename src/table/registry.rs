//! Live tables keyed by id, plus the periodic tick driver.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::supervisor::{Table, TableStage};

#[derive(Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table previously registered under the same id.
    pub fn insert(&self, table: Arc<Table>) -> Option<Arc<Table>> {
        let id = table.id().to_string();
        self.tables.write().unwrap_or_else(|e| e.into_inner()).insert(id, table)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Table>> {
        self.tables.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Table>> {
        self.tables.write().unwrap_or_else(|e| e.into_inner()).remove(id)
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn table_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Tick every table, then drop the ones whose session has ended.
    /// Returns how many were dropped.
    pub fn tick_all(&self, now: Instant) -> usize {
        let tables: Vec<Arc<Table>> = self
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for table in &tables {
            table.tick(now);
        }
        let mut guard = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|id, table| {
            let keep = table.stage() != TableStage::Finished;
            if !keep {
                tracing::info!(table_id = %id, "table removed");
            }
            keep
        });
        before - guard.len()
    }

    pub fn spawn_ticker(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(period));
            while ticks.next().await.is_some() {
                self.tick_all(Instant::now());
            }
        })
    }
}
