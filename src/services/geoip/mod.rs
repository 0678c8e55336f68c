//! GeoIP 服务模块
//!
//! 提供 IP 地址地理位置查询功能，支持：
//! - MaxMind GeoLite2 本地数据库 (feature `geoip-maxmind`)
//! - 外部 HTTP API (ipinfo.io / ip-api.com)

mod external_api;
#[cfg(feature = "geoip-maxmind")]
mod maxmind;
mod provider;

pub use external_api::ExternalApiProvider;
pub use provider::{GeoInfo, GeoIpLookup, GeoIpProvider};
