use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::services::{CounterService, GeoIpProvider, VisitorLogService};
use crate::storage::{CounterStore, StorageFactory};

pub struct StartupContext {
    pub store: Arc<dyn CounterStore>,
    pub counter_service: CounterService,
    pub visitor_service: VisitorLogService,
}

/// rustls 的 ring 加密后端（sqlx 与 ureq 共用），重复安装只记录日志
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// 准备服务器启动的上下文
///
/// 存储不可用时服务仍然启动，请求时重试连接
pub async fn prepare_server_startup(config: &AppConfig) -> StartupContext {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    install_crypto_provider();

    // 初始化在这里完成，失败时 LazyStore 会在请求中重试
    let store = StorageFactory::create_for_server(&config.storage).await;
    let counter_service = CounterService::new(store.clone());

    let geo = GeoIpProvider::new(&config.geo);
    let visitor_service = VisitorLogService::new(store.clone(), geo, config.geo.strict);

    info!(
        "Pre-startup completed in {} ms (storage: {})",
        start_time.elapsed().as_millis(),
        store.backend_name()
    );

    StartupContext {
        store,
        counter_service,
        visitor_service,
    }
}

/// CLI 模式：存储必须可用
pub async fn prepare_cli_startup(config: &AppConfig) -> Result<CounterService> {
    install_crypto_provider();

    let store = StorageFactory::create(&config.storage)
        .await
        .context("Failed to create storage backend")?;
    Ok(CounterService::new(store))
}
