//! Counter service
//!
//! Initialize / increment / read against the singleton counter. The store is
//! injected once at startup and shared by every handler.

use std::sync::Arc;

use tracing::{debug, error, info, trace};

use crate::errors::Result;
use crate::storage::CounterStore;

#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn CounterStore>,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Make sure the counter record exists. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<()> {
        match self.store.ensure_initialized().await {
            Ok(()) => {
                info!("Counter initialized ({} backend)", self.backend_name());
                Ok(())
            }
            Err(e) => {
                error!(
                    "Counter initialization failed ({} backend): {}",
                    self.backend_name(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Atomically add one, returning the new count
    pub async fn increment(&self) -> Result<u64> {
        let count = self.store.increment().await.inspect_err(|e| {
            error!("Failed to increment visitor count: {}", e);
        })?;
        debug!("Visitor count incremented to {}", count);
        Ok(count)
    }

    pub async fn get_count(&self) -> Result<u64> {
        let count = self.store.read_count().await.inspect_err(|e| {
            error!("Failed to read visitor count: {}", e);
        })?;
        trace!("Visitor count read: {}", count);
        Ok(count)
    }
}
