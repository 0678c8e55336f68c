//! Store that connects on demand
//!
//! Used by the server when the backend is unreachable at startup. Every call
//! tries to build and initialize the configured backend until one attempt
//! succeeds; after that the call goes straight to the connected store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{CounterStore, StorageFactory, VisitorRecord};
use crate::config::StorageConfig;
use crate::errors::{CounterError, Result};

pub struct LazyStore {
    config: StorageConfig,
    connected: OnceCell<Arc<dyn CounterStore>>,
}

impl LazyStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            connected: OnceCell::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.initialized()
    }

    /// 失败时不缓存，下一次调用重新连接
    async fn connect(&self) -> Result<&Arc<dyn CounterStore>> {
        self.connected
            .get_or_try_init(|| async {
                debug!("Connecting {} storage", self.config.backend);
                let store = StorageFactory::create(&self.config).await?;
                store.ensure_initialized().await?;
                info!("{} storage is ready", store.backend_name());
                Ok::<_, CounterError>(store)
            })
            .await
    }
}

#[async_trait]
impl CounterStore for LazyStore {
    async fn ensure_initialized(&self) -> Result<()> {
        self.connect().await.map(|_| ())
    }

    async fn read_count(&self) -> Result<u64> {
        self.connect().await?.read_count().await
    }

    async fn increment(&self) -> Result<u64> {
        self.connect().await?.increment().await
    }

    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()> {
        self.connect().await?.append_visitor(record).await
    }

    fn backend_name(&self) -> &'static str {
        match self.connected.get() {
            Some(store) => store.backend_name(),
            None => self.config.backend.into(),
        }
    }
}
