//! SQLite-backed durable cache store provider.
//!
//! A single database holds every named store. Stores are rows in
//! `cache_stores`; entries cascade with their store, so deleting a store
//! reclaims everything it held. Access goes through tokio-rusqlite.
//!
//! - Named stores with open / list / delete
//! - Per-store request → response entries keyed by a SHA-256 descriptor
//! - Age and count based expiration, oldest write evicted first
//! - Lifecycle bookkeeping (installed / active version)

pub mod connection;
pub mod entries;
pub mod expiration;
pub mod hash;
pub mod migrations;
pub mod state;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use expiration::ExpirationPolicy;
pub use stores::{Store, StoreInfo};

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width UTC timestamp; sorts lexicographically in time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
