//! visitor-counter - a visitor counter and visitor log service
//!
//! One persistent counter, incremented atomically and read over HTTP, plus an
//! append-only log of visitor IPs with best-effort geolocation.
//!
//! # Architecture
//! - `storage`: `CounterStore` trait and its file / database / Supabase / memory adapters
//! - `services`: counter and visitor logging logic, GeoIP providers
//! - `api`: actix-web handlers and middleware
//! - `config`: configuration (TOML + environment)
//! - `runtime`: startup and execution modes (server, CLI)
//! - `system`: logging setup

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
