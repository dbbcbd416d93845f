//! cache_stores tool implementation.
//!
//! Lists the stores with their sizes, the lifecycle state and the
//! allow-list, optionally with the URLs held by one store.

use orc_client::{OfflineCache, WorkerState};
use orc_core::{Error, StoreInfo};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_stores tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresParams {
    /// List the URLs held by this store, oldest write first.
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_stores tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheStoresOutput {
    pub version: String,
    pub state: WorkerState,
    /// Stores that survive the next activation.
    pub allow_list: Vec<String>,
    pub stores: Vec<StoreInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

/// Implementation of the cache_stores tool.
pub async fn stores_impl(cache: &OfflineCache, params: CacheStoresParams) -> Result<CallToolResult, McpError> {
    let urls = match params.store {
        Some(name) => {
            if !cache.db().has_store(&name).await? {
                return Err(Error::StoreNotFound(name).into());
            }
            Some(cache.db().store(&name).urls().await?)
        }
        None => None,
    };

    let output = CacheStoresOutput {
        version: cache.version().to_string(),
        state: cache.state().await,
        allow_list: cache.allow_list().into_iter().collect(),
        stores: cache.db().store_info().await?,
        urls,
    };

    json_result(&output)
}
