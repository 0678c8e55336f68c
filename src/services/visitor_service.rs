//! Visitor logging service
//!
//! Resolves the caller's location and appends a [`VisitorRecord`]. Never
//! touches the counter.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::geoip::GeoIpProvider;
use crate::errors::Result;
use crate::storage::{CounterStore, VisitorRecord};
use crate::utils::ip::is_private_or_local;

#[derive(Clone)]
pub struct VisitorLogService {
    store: Arc<dyn CounterStore>,
    geo: GeoIpProvider,
    /// 查询失败时让请求失败，否则只记录 IP
    strict: bool,
}

impl VisitorLogService {
    pub fn new(store: Arc<dyn CounterStore>, geo: GeoIpProvider, strict: bool) -> Self {
        Self { store, geo, strict }
    }

    /// Look up `ip` and append a visitor record, returning what was stored
    pub async fn log_visitor(&self, ip: &str) -> Result<VisitorRecord> {
        info!("Logging visitor from IP: {}", ip);

        let mut record = VisitorRecord::new(ip);

        match ip.parse::<IpAddr>() {
            Ok(addr) if is_private_or_local(&addr) => {
                debug!("Skipping geolocation for private address {}", addr);
            }
            Ok(addr) => match self.geo.lookup(addr).await {
                Ok(Some(geo)) => {
                    record = record.with_location(geo.city, geo.region, geo.country);
                }
                Ok(None) => {}
                Err(e) if self.strict => {
                    warn!("Geolocation failed for {}: {}", addr, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Geolocation failed for {}, storing without location: {}", addr, e);
                }
            },
            Err(_) => {
                debug!("Client address '{}' is not an IP, skipping geolocation", ip);
            }
        }

        self.store.append_visitor(&record).await.inspect_err(|e| {
            warn!("Failed to store visitor record: {}", e);
        })?;

        Ok(record)
    }
}
