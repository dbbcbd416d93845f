//! Caching strategies.
//!
//! Each strategy takes a request and a `RouteTarget` and always produces a
//! response unless network, store and offline fallback are all empty.
//! Store failures never fail a request: a failed read is a miss, a failed
//! write is logged and the network response is still returned.

pub mod cache_first;
pub mod network_first;
pub mod stale_while_revalidate;

use std::sync::Arc;

use orc_core::{CacheDb, Error, Request, Response, ResponseSource, StrategyKind};
use tokio::task::JoinHandle;

use crate::fetch::Transport;
use crate::router::{Fallback, RouteTarget};

pub use cache_first::cache_first;
pub use network_first::network_first;
pub use stale_while_revalidate::stale_while_revalidate;

/// Where the offline fallback document lives.
#[derive(Debug, Clone)]
pub struct OfflineDocument {
    pub store: String,
    pub request: Request,
}

/// Everything a strategy needs besides the request itself.
#[derive(Clone)]
pub struct StrategyContext {
    pub db: CacheDb,
    pub transport: Arc<dyn Transport>,
    pub offline: OfflineDocument,
}

/// A served response plus the background refresh it started, if any.
#[derive(Debug)]
pub struct Handled {
    pub response: Response,
    pub revalidation: Option<JoinHandle<()>>,
}

impl Handled {
    pub fn new(response: Response) -> Self {
        Self { response, revalidation: None }
    }
}

impl StrategyContext {
    /// Store lookup honouring the target's age bound. Errors count as misses.
    pub(crate) async fn lookup(&self, target: &RouteTarget, request: &Request) -> Option<Response> {
        match self.db.store(&target.store).match_fresh(request, &target.expiration).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(store = %target.store, url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write a network response if the target allows its status, then
    /// enforce expiration. Failures are logged, never returned.
    pub(crate) async fn remember(&self, target: &RouteTarget, request: &Request, response: &Response) {
        if !target.cacheable.allows(response.status) {
            tracing::debug!(store = %target.store, status = response.status, "response not cacheable");
            return;
        }

        let store = self.db.store(&target.store);
        if let Err(e) = store.put(request, response).await {
            tracing::warn!(store = %target.store, url = %request.url, error = %e, "cache write failed");
            return;
        }

        if let Err(e) = store.expire(&target.expiration).await {
            tracing::warn!(store = %target.store, error = %e, "cache expiration failed");
        }
    }

    /// The installed offline document, tagged as such.
    pub async fn offline_document(&self) -> Option<Response> {
        match self.db.store(&self.offline.store).match_request(&self.offline.request).await {
            Ok(doc) => doc.map(|r| r.with_source(ResponseSource::OfflineDocument)),
            Err(e) => {
                tracing::warn!(store = %self.offline.store, error = %e, "offline document lookup failed");
                None
            }
        }
    }

    /// Last resort once network and store both failed.
    pub(crate) async fn fall_back(&self, target: &RouteTarget, request: &Request, err: Error) -> Result<Response, Error> {
        match target.fallback {
            Fallback::None => Err(err),
            Fallback::OfflineJson => Ok(Response::offline_json()),
            Fallback::OfflineDocument => match self.offline_document().await {
                Some(doc) => Ok(doc),
                None => Err(Error::Offline(format!("{} ({err})", request.url))),
            },
        }
    }
}

/// Pass straight through to the network; nothing is cached.
pub async fn network_only(ctx: &StrategyContext, target: &RouteTarget, request: &Request) -> Result<Response, Error> {
    match ctx.transport.fetch(request).await {
        Ok(response) => Ok(response.with_source(ResponseSource::Network)),
        Err(err) => ctx.fall_back(target, request, err).await,
    }
}

/// Dispatch to the target's strategy.
pub async fn run(ctx: &StrategyContext, target: &RouteTarget, request: &Request) -> Result<Handled, Error> {
    match target.strategy {
        StrategyKind::CacheFirst => cache_first(ctx, target, request).await.map(Handled::new),
        StrategyKind::NetworkFirst => network_first(ctx, target, request).await.map(Handled::new),
        StrategyKind::StaleWhileRevalidate => stale_while_revalidate(ctx, target, request).await,
        StrategyKind::NetworkOnly => network_only(ctx, target, request).await.map(Handled::new),
    }
}
