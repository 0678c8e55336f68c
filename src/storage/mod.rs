//! Counter storage
//!
//! Every persistence backend implements [`CounterStore`]. The store is built
//! once by [`StorageFactory`] and handed to the services as
//! `Arc<dyn CounterStore>`. A backend that is down at startup is wrapped in
//! a [`LazyStore`] and reconnected on demand.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{CounterError, Result};

pub mod backend;
pub mod file;
pub mod hosted;
pub mod lazy;
pub mod memory;
pub mod models;
pub mod retry;
pub mod unavailable;

pub use backend::SeaOrmStorage;
pub use file::FileStorage;
pub use hosted::HostedStorage;
pub use lazy::LazyStore;
pub use memory::MemoryStore;
pub use models::{COUNTER_ID, CounterRow, MAX_COUNT, VisitorRecord, next_count};
pub use unavailable::UnavailableStore;

/// Storage adapter for the singleton counter and the visitor log
///
/// Implementations must make `increment` atomic with respect to concurrent
/// callers, and `ensure_initialized` must never overwrite an existing count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Create the counter record with `count = 0` if it does not exist yet
    async fn ensure_initialized(&self) -> Result<()>;

    /// Current count, without mutation
    async fn read_count(&self) -> Result<u64>;

    /// Add one and return the new value
    async fn increment(&self) -> Result<u64>;

    /// Append one visitor record
    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()>;

    /// Short backend label for logs and health output
    fn backend_name(&self) -> &'static str;
}

pub struct StorageFactory;

impl StorageFactory {
    /// Build the adapter selected by `storage.backend`
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn CounterStore>> {
        let store: Arc<dyn CounterStore> = match config.backend {
            StorageBackend::File => Arc::new(FileStorage::new(&config.file)),
            StorageBackend::Database => Arc::new(SeaOrmStorage::connect(&config.database).await?),
            StorageBackend::Supabase => Arc::new(HostedStorage::new(&config.supabase)?),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };

        info!("Storage backend selected: {}", store.backend_name());
        Ok(store)
    }

    /// Build and initialize the store for the server, which starts either way.
    ///
    /// A configuration error cannot fix itself and yields an
    /// [`UnavailableStore`]. Any other failure leaves a [`LazyStore`] that
    /// retries on each request.
    pub async fn create_for_server(config: &StorageConfig) -> Arc<dyn CounterStore> {
        let store = LazyStore::new(config.clone());

        match store.ensure_initialized().await {
            Ok(()) => {}
            Err(e @ CounterError::Configuration(_)) => {
                error!(
                    "Invalid {} storage configuration, requests will fail until fixed: {}",
                    config.backend, e
                );
                return Arc::new(UnavailableStore::new(e));
            }
            Err(e) => warn!(
                "{} storage is not ready, retrying on the next request: {}",
                config.backend, e
            ),
        }

        Arc::new(store)
    }
}
