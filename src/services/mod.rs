//! Service layer
//!
//! Business logic shared by the HTTP handlers and the CLI.

mod counter_service;
pub mod geoip;
mod visitor_service;

pub use counter_service::CounterService;
pub use geoip::{GeoInfo, GeoIpLookup, GeoIpProvider};
pub use visitor_service::VisitorLogService;
