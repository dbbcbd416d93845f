//! Cache-first: serve from the store, touch the network only on a miss.

use orc_core::{Error, Request, Response, ResponseSource};

use super::StrategyContext;
use crate::router::RouteTarget;

pub async fn cache_first(ctx: &StrategyContext, target: &RouteTarget, request: &Request) -> Result<Response, Error> {
    if let Some(hit) = ctx.lookup(target, request).await {
        tracing::debug!(store = %target.store, url = %request.url, "cache hit");
        return Ok(hit);
    }

    tracing::debug!(store = %target.store, url = %request.url, "cache miss");
    match ctx.transport.fetch(request).await {
        Ok(response) => {
            ctx.remember(target, request, &response).await;
            Ok(response.with_source(ResponseSource::Network))
        }
        Err(err) => {
            tracing::debug!(url = %request.url, error = %err, "network failed on cache miss");
            ctx.fall_back(target, request, err).await
        }
    }
}
