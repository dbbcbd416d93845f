//! Client side of the offline request cache.
//!
//! This crate provides the network transport, the routing table, the
//! caching strategies, install / activate lifecycle and the event
//! dispatcher (`OfflineCache`) used by the server.

pub mod fetch;
pub mod lifecycle;
pub mod push;
pub mod router;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchClient, FetchConfig, Transport};
pub use lifecycle::{ActivateReport, InstallReport, PrecacheFailure, stores_to_delete};
pub use push::{Notification, Notifier, PushPayload, TracingNotifier};
pub use router::{Cacheable, Fallback, Matcher, Route, RouteTarget, Router};
pub use strategy::{Handled, StrategyContext};
pub use worker::{Event, OfflineCache, Outcome, WorkerMessage, WorkerState};
