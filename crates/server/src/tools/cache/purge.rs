//! cache_purge tool implementation.
//!
//! Deletes a whole store, or a single entry from it.

use orc_client::{OfflineCache, fetch::canonicalize};
use orc_core::{Error, Request};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Store to purge.
    pub store: String,

    /// Remove only the GET entry for this URL instead of the whole store.
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub store: String,
    /// Number of entries deleted.
    pub deleted: u64,
    /// Whether the store itself was removed.
    pub store_deleted: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &OfflineCache, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.store.trim().is_empty() {
        return Err(ToolError::InvalidInput("store cannot be empty".into()).into());
    }
    if !cache.db().has_store(&params.store).await? {
        return Err(Error::StoreNotFound(params.store).into());
    }

    let store = cache.db().store(&params.store);
    let output = match params.url {
        Some(raw) => {
            let origin =
                Url::parse(&cache.config().origin).map_err(|e| ToolError::InvalidInput(format!("origin: {e}")))?;
            let url = canonicalize(&raw, Some(&origin)).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
            let deleted = store.delete(&Request::get(url)).await?;
            CachePurgeOutput { store: params.store, deleted: u64::from(deleted), store_deleted: false }
        }
        None => {
            let entries = store.len().await?;
            let store_deleted = cache.db().delete_store(&params.store).await?;
            tracing::info!(store = %params.store, entries, "purged store");
            CachePurgeOutput { store: params.store, deleted: entries, store_deleted }
        }
    };

    json_result(&output)
}
