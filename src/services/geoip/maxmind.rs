//! MaxMind GeoLite2 数据库实现
//!
//! 使用本地 MaxMind GeoLite2-City.mmdb 文件进行 IP 地理位置查询

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::Reader;
use tracing::trace;

use super::provider::{GeoInfo, GeoIpLookup};
use crate::errors::{CounterError, Result};

/// MaxMind GeoIP Provider
pub struct MaxMindProvider {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindProvider {
    /// 从文件路径创建 MaxMind Provider
    pub fn new(path: &str) -> std::result::Result<Self, maxminddb::MaxMindDbError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    /// 数据库中没有记录的地址（内网等）返回空位置
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo> {
        let result = self
            .reader
            .lookup(ip)
            .map_err(|e| CounterError::external_lookup(format!("MaxMind lookup failed: {}", e)))?;

        let city: Option<maxminddb::geoip2::City> = result
            .decode()
            .map_err(|e| CounterError::external_lookup(format!("MaxMind decode failed: {}", e)))?;

        let Some(city) = city else {
            trace!("MaxMind has no record for {}", ip);
            return Ok(GeoInfo::default());
        };

        let country = city.country.iso_code.map(String::from);
        let city_name = city.city.names.english.map(|s| s.to_string());

        trace!(
            "MaxMind lookup for {}: country={:?}, city={:?}",
            ip, country, city_name
        );

        Ok(GeoInfo {
            city: city_name,
            region: None,
            country,
        })
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
