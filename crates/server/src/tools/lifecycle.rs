//! cache_install and cache_activate tool implementations.

use orc_client::{OfflineCache, WorkerMessage};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the cache_activate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateParams {
    /// Only activate if the configured version is installed and waiting,
    /// as a page posting SKIP_WAITING would.
    #[serde(default)]
    pub only_if_waiting: bool,
}

/// Precache the manifest and offline document for the configured version.
pub async fn install_impl(cache: &OfflineCache) -> Result<CallToolResult, McpError> {
    let report = cache.install().await?;
    json_result(&report)
}

/// Delete stores outside the allow-list and mark the version active.
pub async fn activate_impl(cache: &OfflineCache, params: CacheActivateParams) -> Result<CallToolResult, McpError> {
    if params.only_if_waiting {
        let report = cache.message(WorkerMessage::SkipWaiting).await?;
        return json_result(&report);
    }

    let report = cache.activate().await?;
    json_result(&report)
}
