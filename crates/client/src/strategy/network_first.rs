//! Network-first: live response when online, stored copy or offline
//! document when not.

use orc_core::{Error, Request, Response, ResponseSource};

use super::StrategyContext;
use crate::router::RouteTarget;

pub async fn network_first(ctx: &StrategyContext, target: &RouteTarget, request: &Request) -> Result<Response, Error> {
    match ctx.transport.fetch(request).await {
        Ok(response) => {
            ctx.remember(target, request, &response).await;
            Ok(response.with_source(ResponseSource::Network))
        }
        Err(err) => {
            tracing::debug!(url = %request.url, error = %err, "network failed, trying store");
            if let Some(hit) = ctx.lookup(target, request).await {
                return Ok(hit);
            }
            ctx.fall_back(target, request, err).await
        }
    }
}
