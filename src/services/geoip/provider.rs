//! GeoIP Provider 抽象层
//!
//! 统一的 GeoIP 查询接口，根据配置自动选择实现：
//! 1. geo.enabled = false → 不查询
//! 2. maxminddb_path 配置且文件可读 → MaxMindProvider
//! 3. 否则 → ExternalApiProvider (默认 ipinfo.io)

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::external_api::ExternalApiProvider;
use crate::config::GeoConfig;
use crate::errors::{CounterError, Result};

/// 地理位置信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub city: Option<String>,
    pub region: Option<String>,
    /// 通常是 ISO 3166-1 alpha-2 国家代码 (e.g., "CN", "US")
    pub country: Option<String>,
}

/// GeoIP 查询 trait
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// 查询 IP 地址的地理位置
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 统一 GeoIP Provider
///
/// 启动时根据配置选择实现，每次查询都有超时上限
#[derive(Clone)]
pub struct GeoIpProvider {
    inner: Option<Arc<dyn GeoIpLookup>>,
    timeout: Duration,
}

impl GeoIpProvider {
    pub fn new(config: &GeoConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        if !config.enabled {
            info!("GeoIP: disabled");
            return Self::disabled();
        }

        let inner = Self::select(config);
        info!("GeoIP: Initialized with {} provider", inner.name());
        Self {
            inner: Some(inner),
            timeout,
        }
    }

    #[cfg(feature = "geoip-maxmind")]
    fn select(config: &GeoConfig) -> Arc<dyn GeoIpLookup> {
        if let Some(path) = config.maxminddb_path.as_deref().filter(|p| !p.is_empty()) {
            match super::maxmind::MaxMindProvider::new(path) {
                Ok(provider) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    return Arc::new(provider);
                }
                Err(e) => {
                    tracing::warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, falling back to external API",
                        path, e
                    );
                }
            }
        } else {
            debug!("GeoIP: No MaxMind database configured, using external API");
        }
        Arc::new(ExternalApiProvider::from_config(config))
    }

    #[cfg(not(feature = "geoip-maxmind"))]
    fn select(config: &GeoConfig) -> Arc<dyn GeoIpLookup> {
        if config.maxminddb_path.is_some() {
            tracing::warn!("GeoIP: built without MaxMind support, ignoring maxminddb_path");
        }
        debug!("GeoIP: using external API");
        Arc::new(ExternalApiProvider::from_config(config))
    }

    /// Provider that never looks anything up
    pub fn disabled() -> Self {
        Self {
            inner: None,
            timeout: Duration::from_secs(1),
        }
    }

    /// Wrap a custom lookup implementation
    pub fn with_lookup(inner: Arc<dyn GeoIpLookup>, timeout: Duration) -> Self {
        Self {
            inner: Some(inner),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// 查询 IP 地址的地理位置
    ///
    /// `Ok(None)` when lookups are disabled
    pub async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoInfo>> {
        let Some(inner) = &self.inner else {
            return Ok(None);
        };

        match tokio::time::timeout(self.timeout, inner.lookup(ip)).await {
            Ok(result) => result.map(Some),
            Err(_) => Err(CounterError::external_lookup(format!(
                "{} lookup for {} timed out after {:?}",
                inner.name(),
                ip,
                self.timeout
            ))),
        }
    }

    /// 获取当前使用的 provider 名称
    pub fn provider_name(&self) -> &'static str {
        self.inner.as_ref().map_or("Disabled", |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowLookup;

    #[async_trait]
    impl GeoIpLookup for SlowLookup {
        async fn lookup(&self, _ip: IpAddr) -> Result<GeoInfo> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(GeoInfo::default())
        }

        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    #[tokio::test]
    async fn test_disabled_provider_returns_none() {
        let provider = GeoIpProvider::new(&GeoConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!provider.is_enabled());
        assert_eq!(provider.provider_name(), "Disabled");
        assert_eq!(provider.lookup("8.8.8.8".parse().unwrap()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_lookup_is_bounded_by_timeout() {
        let provider = GeoIpProvider::with_lookup(Arc::new(SlowLookup), Duration::from_millis(50));
        let err = provider
            .lookup("1.1.1.1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CounterError::ExternalLookup(_)));
        assert!(err.message().contains("timed out"));
    }

    #[test]
    fn test_default_config_uses_external_api() {
        let provider = GeoIpProvider::new(&GeoConfig::default());
        assert_eq!(provider.provider_name(), "ExternalAPI");
    }
}
