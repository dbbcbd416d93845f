//! Core types and shared functionality for the offline request cache.
//!
//! This crate provides:
//! - Durable named cache stores with a SQLite backend
//! - Transport-neutral request / response snapshots
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, ExpirationPolicy, Store, StoreInfo};
pub use config::{AppConfig, ConfigError, PrecacheEntry, RuntimeRule, StrategyKind};
pub use error::Error;
pub use http::{Destination, Request, RequestMode, Response, ResponseSource};
