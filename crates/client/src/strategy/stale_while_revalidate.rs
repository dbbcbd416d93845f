//! Stale-while-revalidate: answer from the store at once, refresh it in
//! the background.

use orc_core::{Error, Request, ResponseSource};

use super::{Handled, StrategyContext};
use crate::router::RouteTarget;

/// Serve the stored copy if present and spawn a refresh; otherwise wait for
/// the network. A failed refresh is dropped; the caller already has its answer.
pub async fn stale_while_revalidate(
    ctx: &StrategyContext, target: &RouteTarget, request: &Request,
) -> Result<Handled, Error> {
    if let Some(hit) = ctx.lookup(target, request).await {
        let bg_ctx = ctx.clone();
        let bg_target = target.clone();
        let bg_request = request.clone();
        let revalidation = tokio::spawn(async move {
            match bg_ctx.transport.fetch(&bg_request).await {
                Ok(fresh) => bg_ctx.remember(&bg_target, &bg_request, &fresh).await,
                Err(e) => tracing::debug!(url = %bg_request.url, error = %e, "background revalidation failed"),
            }
        });
        return Ok(Handled { response: hit, revalidation: Some(revalidation) });
    }

    match ctx.transport.fetch(request).await {
        Ok(response) => {
            ctx.remember(target, request, &response).await;
            Ok(Handled::new(response.with_source(ResponseSource::Network)))
        }
        Err(err) => ctx.fall_back(target, request, err).await.map(Handled::new),
    }
}
