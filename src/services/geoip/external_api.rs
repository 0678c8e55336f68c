//! 外部 GeoIP API 实现
//!
//! 使用外部 HTTP API 进行 IP 地理位置查询（默认 ipinfo.io，也兼容 ip-api.com）
//! 内置 LRU 缓存 + Singleflight 语义，避免重复查询

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{trace, warn};
use ureq::Agent;

use super::provider::{GeoInfo, GeoIpLookup};
use crate::config::GeoConfig;
use crate::errors::{CounterError, Result};

/// GeoIP 缓存 TTL（15 分钟）
const GEOIP_CACHE_TTL_SECS: u64 = 15 * 60;
/// GeoIP 缓存最大容量
const GEOIP_CACHE_MAX_CAPACITY: u64 = 10_000;

/// 外部 API GeoIP Provider
///
/// 只缓存成功结果，失败的查询下次会重新请求
pub struct ExternalApiProvider {
    agent: Agent,
    api_url_template: String,
    token: Option<String>,
    cache: Cache<IpAddr, GeoInfo>,
}

impl ExternalApiProvider {
    /// `api_url_template` 使用 `{ip}` 作为占位符
    pub fn new(api_url_template: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(GEOIP_CACHE_TTL_SECS))
            .max_capacity(GEOIP_CACHE_MAX_CAPACITY)
            .build();

        Self {
            agent,
            api_url_template: api_url_template.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            cache,
        }
    }

    pub fn from_config(config: &GeoConfig) -> Self {
        Self::new(
            &config.api_url,
            config.ipinfo_token.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    /// 拼接查询 URL，有 token 时追加 `token` 参数
    pub fn build_url(&self, ip: IpAddr) -> Result<String> {
        let raw = self.api_url_template.replace("{ip}", &ip.to_string());
        let mut url = url::Url::parse(&raw).map_err(|e| {
            CounterError::configuration(format!("Invalid GeoIP API URL '{}': {}", raw, e))
        })?;
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url.into())
    }

    /// 解析 ipinfo.io / ip-api.com 风格的响应
    pub fn parse_response(json: &serde_json::Value) -> Result<GeoInfo> {
        // ip-api.com 失败时返回: {"status": "fail", "message": "..."}
        if json["status"].as_str() == Some("fail") {
            let reason = json["message"].as_str().unwrap_or("unknown reason");
            return Err(CounterError::external_lookup(format!(
                "GeoIP API reported failure: {}",
                reason
            )));
        }
        // ipinfo.io 错误格式: {"error": {"title": "...", "message": "..."}}
        if let Some(error) = json.get("error") {
            let reason = error["title"]
                .as_str()
                .or_else(|| error.as_str())
                .unwrap_or("unknown error");
            return Err(CounterError::external_lookup(format!(
                "GeoIP API returned an error: {}",
                reason
            )));
        }

        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| json[*k].as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Ok(GeoInfo {
            city: text(&["city"]),
            region: text(&["region", "regionName", "region_name"]),
            // ip-api.com 的 country 是全称，优先取国家代码
            country: text(&["countryCode", "country_code", "country"]),
        })
    }

    /// 同步请求，在 spawn_blocking 中调用
    fn fetch_from_api_sync(agent: Agent, url: String) -> Result<GeoInfo> {
        let json: serde_json::Value = agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .and_then(|resp| resp.into_body().read_json())
            .map_err(|e| {
                CounterError::external_lookup(format!("GeoIP API request failed: {}", e))
            })?;

        let info = Self::parse_response(&json)?;
        trace!(
            "External API lookup: city={:?}, region={:?}, country={:?}",
            info.city, info.region, info.country
        );
        Ok(info)
    }

    async fn fetch_from_api(&self, ip: IpAddr) -> Result<GeoInfo> {
        let url = self.build_url(ip)?;
        let agent = self.agent.clone();

        tokio::task::spawn_blocking(move || Self::fetch_from_api_sync(agent, url))
            .await
            .map_err(|e| {
                warn!("GeoIP spawn_blocking failed: {}", e);
                CounterError::external_lookup(format!("GeoIP task failed: {}", e))
            })?
    }
}

#[async_trait]
impl GeoIpLookup for ExternalApiProvider {
    /// 并发请求同一 IP 时只有一个发起 HTTP 请求，其他等待结果
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo> {
        self.cache
            .try_get_with(ip, async {
                trace!("GeoIP cache miss for {}, fetching from API", ip);
                self.fetch_from_api(ip).await
            })
            .await
            .map_err(|e| (*e).clone())
    }

    fn name(&self) -> &'static str {
        "ExternalAPI"
    }
}
