//! Placeholder store used when the storage configuration is invalid

use async_trait::async_trait;

use super::{CounterStore, VisitorRecord};
use crate::errors::{CounterError, Result};

/// Fails every operation with the error that prevented construction
pub struct UnavailableStore {
    cause: CounterError,
}

impl UnavailableStore {
    pub fn new(cause: CounterError) -> Self {
        Self { cause }
    }
}

#[async_trait]
impl CounterStore for UnavailableStore {
    async fn ensure_initialized(&self) -> Result<()> {
        Err(self.cause.clone())
    }

    async fn read_count(&self) -> Result<u64> {
        Err(self.cause.clone())
    }

    async fn increment(&self) -> Result<u64> {
        Err(self.cause.clone())
    }

    async fn append_visitor(&self, _record: &VisitorRecord) -> Result<()> {
        Err(self.cause.clone())
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}
