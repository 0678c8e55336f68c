//! In-process counter store, mainly for tests and throw-away demos

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CounterStore, VisitorRecord, next_count};
use crate::errors::{CounterError, Result};

#[derive(Default)]
pub struct MemoryStore {
    initialized: AtomicBool,
    count: AtomicU64,
    visitors: Mutex<Vec<VisitorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that is already initialized with `count`
    pub fn with_count(count: u64) -> Self {
        let store = Self::new();
        store.count.store(count, Ordering::SeqCst);
        store.initialized.store(true, Ordering::SeqCst);
        store
    }

    /// Snapshot of the visitor log
    pub fn visitors(&self) -> Vec<VisitorRecord> {
        self.visitors.lock().clone()
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CounterError::not_initialized("memory counter was never initialized"))
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_count(&self) -> Result<u64> {
        self.check_initialized()?;
        Ok(self.count.load(Ordering::SeqCst))
    }

    async fn increment(&self) -> Result<u64> {
        self.check_initialized()?;
        let mut current = self.count.load(Ordering::SeqCst);
        loop {
            let next = next_count(current)?;
            match self
                .count
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }

    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()> {
        self.visitors.lock().push(record.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
