//! Install and activate.
//!
//! Install fills the main store from the precache manifest and the offline
//! store with the fallback document. Activate deletes every store outside
//! the allow-list. Both record their version in `worker_state`.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use orc_core::cache::state::{ACTIVE_VERSION, INSTALLED_VERSION};
use orc_core::{Error, PrecacheEntry, Request, Store};
use serde::Serialize;

use crate::worker::OfflineCache;

/// Existing stores that are not on the allow-list, in input order.
pub fn stores_to_delete(existing: &[String], allow: &BTreeSet<String>) -> Vec<String> {
    existing.iter().filter(|name| !allow.contains(*name)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

/// What an install did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    /// Assets fetched and written.
    pub stored: Vec<String>,
    /// Assets already stored at the same revision.
    pub unchanged: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
    /// Whether the offline document is now in its store.
    pub offline_document: bool,
    /// Present when install went straight on to activation.
    pub activation: Option<ActivateReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub version: String,
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

enum Precached {
    Stored(String),
    Unchanged(String),
}

impl OfflineCache {
    /// Precache the manifest and the offline document for the configured
    /// version.
    ///
    /// Asset failures are collected in the report; they never abort the
    /// others. With `skip_waiting` set, activation follows immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded or the installed
    /// version cannot be recorded.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let version = self.version().to_string();
        let main = self.config.main_store();
        tracing::info!(version = %version, store = %main, "installing");

        for name in self.allow_list() {
            if let Err(e) = self.db().open_store(&name).await {
                tracing::warn!(store = %name, error = %e, "failed to open store");
            }
        }

        let manifest = self.config.precache_manifest()?;
        let store = self.db().store(&main);
        let results = join_all(manifest.iter().map(|entry| self.precache_one(&store, entry))).await;

        let mut report = InstallReport {
            version: version.clone(),
            stored: Vec::new(),
            unchanged: Vec::new(),
            failed: Vec::new(),
            offline_document: false,
            activation: None,
        };

        for (entry, result) in manifest.iter().zip(results) {
            match result {
                Ok(Precached::Stored(url)) => report.stored.push(url),
                Ok(Precached::Unchanged(url)) => report.unchanged.push(url),
                Err(reason) => {
                    tracing::warn!(url = %entry.url, reason = %reason, "precache failed");
                    report.failed.push(PrecacheFailure { url: entry.url.clone(), reason });
                }
            }
        }

        report.offline_document = self.precache_offline_document().await;

        self.db().set_state(INSTALLED_VERSION, &version).await?;
        self.state.write().await.installed = Some(version.clone());
        tracing::info!(
            version = %version,
            stored = report.stored.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "installed"
        );

        if self.config.skip_waiting {
            report.activation = Some(self.activate().await?);
        } else {
            tracing::info!(version = %version, "installed version waiting for activation");
        }

        Ok(report)
    }

    async fn precache_one(&self, store: &Store, entry: &PrecacheEntry) -> Result<Precached, String> {
        let url = self.config.resolve(&entry.url).map_err(|e| e.to_string())?;
        let request = Request::get(url);

        if entry.revision.is_some()
            && let Ok(Some(stored)) = store.entry(&request).await
            && stored.revision == entry.revision
        {
            tracing::debug!(url = %request.url, "precache entry unchanged");
            return Ok(Precached::Unchanged(request.url.to_string()));
        }

        let response = self.ctx.transport.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("status {}", response.status));
        }

        store
            .put_revision(&request, &response, entry.revision.as_deref())
            .await
            .map_err(|e| e.to_string())?;
        Ok(Precached::Stored(request.url.to_string()))
    }

    async fn precache_offline_document(&self) -> bool {
        let offline = &self.ctx.offline;
        let response = match self.ctx.transport.fetch(&offline.request).await {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                tracing::warn!(url = %offline.request.url, status = r.status, "offline document not cached");
                return false;
            }
            Err(e) => {
                tracing::warn!(url = %offline.request.url, error = %e, "offline document not cached");
                return false;
            }
        };

        match self.db().store(&offline.store).put(&offline.request, &response).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(store = %offline.store, error = %e, "offline document write failed");
                false
            }
        }
    }

    /// Delete every store outside the allow-list and mark the configured
    /// version active.
    ///
    /// # Errors
    ///
    /// Returns a database error if the stores cannot be listed or the
    /// active version cannot be recorded. Individual delete failures are
    /// logged and the store is reported as kept.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let version = self.version().to_string();
        let existing = self.db().list_store_names().await?;
        let doomed = stores_to_delete(&existing, &self.allow_list());

        let mut deleted = Vec::with_capacity(doomed.len());
        for name in &doomed {
            match self.db().delete_store(name).await {
                Ok(_) => {
                    tracing::info!(store = %name, "deleted stale store");
                    deleted.push(name.clone());
                }
                Err(e) => tracing::warn!(store = %name, error = %e, "failed to delete stale store"),
            }
        }
        let kept = existing.into_iter().filter(|n| !deleted.contains(n)).collect();

        self.db().set_state(ACTIVE_VERSION, &version).await?;
        self.state.write().await.active = Some(version.clone());
        tracing::info!(version = %version, deleted = deleted.len(), "activated");

        Ok(ActivateReport { version, deleted, kept })
    }
}
